#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// A temporary file holding `content`, removed when dropped.
    pub fn create_temp_spec(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("swaggerware_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_spec(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_spec(content, "json")
    }
}

pub mod fixtures {
    use http::Method;
    use std::sync::Arc;
    use swaggerware::app::App;
    use swaggerware::config::AppConfig;
    use swaggerware::demo;
    use swaggerware::dispatcher::{Dispatcher, HandlerResponse};
    use swaggerware::registry::RouteRegistry;
    use swaggerware::server::{AppService, ParsedRequest};

    pub fn demo_service() -> AppService {
        demo_service_with(&AppConfig::default())
    }

    pub fn demo_service_with(config: &AppConfig) -> AppService {
        let registry = demo::registry(&config.spec.base_path);
        let mut app = App::build(demo::base_document().unwrap(), &registry, config).unwrap();
        demo::register_handlers(app.dispatcher_mut(), Arc::new(demo::Store::seeded()));
        app.into_service()
    }

    /// A service for custom routes over the demo base document.
    pub fn service_with<F>(registry: &RouteRegistry, config: &AppConfig, register: F) -> AppService
    where
        F: FnOnce(&mut Dispatcher),
    {
        let mut app = App::build(demo::base_document().unwrap(), registry, config).unwrap();
        register(app.dispatcher_mut());
        app.into_service()
    }

    pub fn get(service: &AppService, target: &str) -> HandlerResponse {
        service.handle(ParsedRequest::new(Method::GET, target))
    }

    /// Assert an `ErrorResponse` body and return its description.
    pub fn error_description(resp: &HandlerResponse, status: u16) -> String {
        assert_eq!(
            resp.status,
            status,
            "body: {}",
            String::from_utf8_lossy(&resp.body)
        );
        let body = resp.json_body().unwrap();
        assert_eq!(body["code"], serde_json::json!(status));
        assert!(body["name"].is_string());
        body["description"].as_str().unwrap().to_string()
    }
}

pub mod test_server {
    use std::sync::Once;

    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}
