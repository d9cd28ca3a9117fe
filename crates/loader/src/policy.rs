use crate::model::ModelId;
use fxhash::FxHashMap;

/// Decides whether objects of `model` may be written through the connection `alias`.
///
/// Rejected objects are skipped without error and are not counted.
pub trait WritePolicy {
    fn allow_write(&self, alias: &str, model: &ModelId) -> bool;
}

/// Accepts every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl WritePolicy for AllowAll {
    fn allow_write(&self, _alias: &str, _model: &ModelId) -> bool {
        true
    }
}

impl<F> WritePolicy for F
where
    F: Fn(&str, &ModelId) -> bool,
{
    fn allow_write(&self, alias: &str, model: &ModelId) -> bool {
        self(alias, model)
    }
}

/// Routes app labels to connection aliases.
///
/// A routed app may only be written through its alias; apps without a route are
/// writable everywhere.
#[derive(Debug, Clone, Default)]
pub struct AppRouter {
    routes: FxHashMap<String, String>,
}

impl AppRouter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, app_label: impl Into<String>, alias: impl Into<String>) -> Self {
        self.routes.insert(app_label.into().to_ascii_lowercase(), alias.into());
        self
    }

    /// Alias `app_label` is pinned to. Labels compare case-insensitively.
    pub fn alias_for(&self, app_label: &str) -> Option<&str> {
        self.routes.get(&app_label.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

impl<A, B> FromIterator<(A, B)> for AppRouter
where
    A: Into<String>,
    B: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (A, B)>>(iter: T) -> Self {
        iter.into_iter().fold(Self::new(), |router, (app, alias)| router.route(app, alias))
    }
}

impl WritePolicy for AppRouter {
    fn allow_write(&self, alias: &str, model: &ModelId) -> bool {
        self.alias_for(model.app_label()).is_none_or(|routed| routed == alias)
    }
}
