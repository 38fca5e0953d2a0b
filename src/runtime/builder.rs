use super::{registry::Interceptor, Config, Hooks, NoHooks, Registry};

/// Assembles a [`Registry`] with non-default hooks or an interceptor.
pub struct Builder {
    config: Config,
    hooks: Box<dyn Hooks>,
    interceptor: Option<Box<Interceptor>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
            hooks: Box::new(NoHooks),
            interceptor: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Installs a callback that note waits poll between bounded parks.
    ///
    /// While installed, no note wait parks for longer than
    /// [`Config::intercept_interval`] at a time.
    pub fn interceptor(mut self, intercept: impl Fn() + Send + Sync + 'static) -> Self {
        self.interceptor = Some(Box::new(intercept));
        self
    }

    pub fn build(self) -> Registry {
        Registry::from_parts(self.config, self.hooks, self.interceptor)
    }
}
