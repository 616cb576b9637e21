//! # Application Wiring
//!
//! Builds the request pipeline from a route registry and a base document:
//!
//! 1. merge the documented routes into one [`Specification`]
//! 2. build the [`Validator`] and compile every schema up front
//! 3. build the [`Router`]
//! 4. build the [`Dispatcher`] with [`SwaggerMiddleware`] and
//!    [`TracingMiddleware`] installed
//!
//! Handlers are registered on [`App::dispatcher_mut`] before the app is
//! turned into an [`AppService`].

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::format::FormatRegistry;
use crate::middleware::{SwaggerMiddleware, TracingMiddleware};
use crate::registry::RouteRegistry;
use crate::router::Router;
use crate::server::AppService;
use crate::spec::{build_spec, Specification};
use crate::validator::Validator;
use crate::validator_cache::ValidatorCache;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub struct App {
    spec: Arc<Specification>,
    validator: Arc<Validator>,
    router: Arc<Router>,
    dispatcher: Dispatcher,
    spec_endpoint: String,
}

impl App {
    /// Build the pipeline for `registry` merged into `base`.
    ///
    /// Fails on any documentation issue and on any schema that does not
    /// compile, unknown formats included.
    pub fn build(base: Value, registry: &RouteRegistry, config: &AppConfig) -> Result<Self> {
        Self::build_with_formats(base, registry, config, FormatRegistry::with_defaults())
    }

    /// As [`App::build`], with a caller-supplied format table.
    pub fn build_with_formats(
        base: Value,
        registry: &RouteRegistry,
        config: &AppConfig,
        formats: FormatRegistry,
    ) -> Result<Self> {
        let spec = Arc::new(
            build_spec(base, registry, &config.spec.base_path)
                .context("Failed to build specification")?,
        );

        let cache = ValidatorCache::new(config.validation.schema_cache);
        let validator = Validator::new(Arc::clone(&spec), formats, cache)
            .context("Failed to prepare schema validator")?;
        let compiled = validator
            .precompile()
            .context("Failed to compile schemas")?;
        let validator = Arc::new(validator);

        let router = Arc::new(Router::new(registry, &spec).context("Failed to build router")?);

        let mut dispatcher = Dispatcher::new(Arc::clone(&spec));
        dispatcher.add_middleware(Arc::new(
            SwaggerMiddleware::new(Arc::clone(&validator))
                .enforce_responses(config.validation.responses),
        ));
        dispatcher.add_middleware(Arc::new(TracingMiddleware));

        info!(
            operations = spec.operations().len(),
            schemas = compiled,
            base_path = %spec.base_path(),
            "Application built"
        );

        Ok(Self {
            spec,
            validator,
            router,
            dispatcher,
            spec_endpoint: config.server.spec_endpoint.clone(),
        })
    }

    #[must_use]
    pub fn spec(&self) -> &Arc<Specification> {
        &self.spec
    }

    #[must_use]
    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    /// Register handlers here before calling [`App::into_service`].
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    #[must_use]
    pub fn into_service(self) -> AppService {
        AppService::new(
            self.router,
            Arc::new(self.dispatcher),
            self.spec,
            self.spec_endpoint,
        )
    }
}
