use std::{collections::HashMap, hash::BuildHasher, sync::Arc};

use crate::{
    error::{StacheError, StacheResult},
    template::Template,
};

/// Resolves partial names to compiled templates.
///
/// Renders call this synchronously whenever they reach a partial that was not
/// resolved ahead of time.
pub trait PartialLoader {
    /// # Errors
    /// - [`StacheError::PartialNotFound`] if nothing is registered under `name`.
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>>;
}

/// A loader with no partials at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPartials;

impl PartialLoader for NoPartials {
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>> {
        Err(StacheError::PartialNotFound {
            name: name.to_string(),
        })
    }
}

impl<S: BuildHasher> PartialLoader for HashMap<String, Arc<Template>, S> {
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| StacheError::PartialNotFound {
                name: name.to_string(),
            })
    }
}

impl<L: PartialLoader + ?Sized> PartialLoader for &L {
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>> {
        (**self).load_partial(name)
    }
}

impl<L: PartialLoader + ?Sized> PartialLoader for Arc<L> {
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>> {
        (**self).load_partial(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(100)]
    fn test_map_loader() {
        let mut partials = HashMap::new();
        partials.insert("p".to_string(), Arc::new(Template::parse("hi").unwrap()));

        assert_eq!(partials.load_partial("p").unwrap().source(), "hi");
        assert_eq!(
            partials.load_partial("q").unwrap_err(),
            StacheError::PartialNotFound {
                name: "q".to_string()
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_no_partials() {
        assert!(matches!(
            NoPartials.load_partial("p"),
            Err(StacheError::PartialNotFound { name }) if name == "p"
        ));
    }
}
