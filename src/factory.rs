use crate::FactoryError;
use std::{fmt, marker::PhantomData};

/// A trait defining how a pool creates new objects.
///
/// `data` is an optional creation parameter whose meaning depends on the
/// factory: [`DefaultFactory`] ignores it, [`HostFactory`] treats it as the
/// template to instantiate, and [`CustomFactory`] hands it to its closure.
pub trait ObjectFactory<T> {
    /// Creation parameter accepted by [`Self::create`].
    type Data: ?Sized;

    /// Creates a new object of type T.
    ///
    /// Must return a fresh instance, never one that was handed out before.
    fn create(&self, data: Option<&Self::Data>) -> Result<T, FactoryError>;
}

/// Builds objects with [`Default::default`].
pub struct DefaultFactory<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> DefaultFactory<T> {
    /// Creates a new default factory.
    pub fn new() -> Self {
        DefaultFactory {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for DefaultFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DefaultFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultFactory")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Default> ObjectFactory<T> for DefaultFactory<T> {
    type Data = ();

    #[inline(always)]
    fn create(&self, _data: Option<&()>) -> Result<T, FactoryError> {
        Ok(T::default())
    }
}

/// Builds objects with a caller supplied closure.
pub struct CustomFactory<D: ?Sized, F> {
    create: F,
    _phantom: PhantomData<fn(&D)>,
}

impl<D: ?Sized, F> CustomFactory<D, F> {
    /// Creates a factory around a fallible creation function.
    pub fn new(create: F) -> Self {
        CustomFactory {
            create,
            _phantom: PhantomData,
        }
    }
}

impl CustomFactory<(), ()> {
    /// Creates a factory from an infallible closure that takes no parameter.
    pub fn from_fn<T, G>(
        create: G,
    ) -> CustomFactory<(), impl Fn(Option<&()>) -> Result<T, FactoryError>>
    where
        G: Fn() -> T,
    {
        CustomFactory::new(move |_: Option<&()>| Ok::<T, FactoryError>(create()))
    }
}

impl<D: ?Sized, F> fmt::Debug for CustomFactory<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFactory").finish_non_exhaustive()
    }
}

impl<T, D: ?Sized, F> ObjectFactory<T> for CustomFactory<D, F>
where
    F: Fn(Option<&D>) -> Result<T, FactoryError>,
{
    type Data = D;

    #[inline(always)]
    fn create(&self, data: Option<&D>) -> Result<T, FactoryError> {
        (self.create)(data)
    }
}

/// The host side of a [`HostFactory`]: turns a template into a raw instance.
///
/// A host is typically an engine or scene graph that knows how to clone a
/// prefab. It is injected into the factory instead of being called directly by
/// the pool.
pub trait Instantiate {
    /// What the host instantiates from.
    type Template;
    /// What the host produces.
    type Instance;

    /// Produces a new instance from `template`.
    fn instantiate(&self, template: &Self::Template) -> Result<Self::Instance, FactoryError>;
}

/// Instantiates a host template and then attaches behavior to the result.
///
/// The template passed to [`ObjectFactory::create`] wins over the default
/// template given at construction. With neither, creation fails with
/// [`FactoryError::MissingTemplate`].
pub struct HostFactory<H: Instantiate, A> {
    host: H,
    template: Option<H::Template>,
    attach: A,
}

impl<H: Instantiate, A> HostFactory<H, A> {
    /// Creates a host-bound factory without a default template.
    pub fn new(host: H, attach: A) -> Self {
        HostFactory {
            host,
            template: None,
            attach,
        }
    }

    /// Sets the template used when `create` is called without one.
    pub fn with_template(mut self, template: H::Template) -> Self {
        self.template = Some(template);
        self
    }

    /// Returns the host.
    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: Instantiate, A> fmt::Debug for HostFactory<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFactory")
            .field("has_template", &self.template.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, H, A> ObjectFactory<T> for HostFactory<H, A>
where
    H: Instantiate,
    A: Fn(H::Instance) -> T,
{
    type Data = H::Template;

    fn create(&self, data: Option<&H::Template>) -> Result<T, FactoryError> {
        let template = data
            .or(self.template.as_ref())
            .ok_or(FactoryError::MissingTemplate)?;
        let instance = self.host.instantiate(template)?;
        Ok((self.attach)(instance))
    }
}
