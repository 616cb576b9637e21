use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::validator::{ValidationError, Validator};

/// Validates requests before their handler runs and responses after.
///
/// A request that fails is answered with a 400 (or a 500 for schema
/// defects) and never reaches its handler. A response that fails is
/// replaced by a 500 carrying the failure message. With `enforce_responses`
/// off, response failures are only logged.
pub struct SwaggerMiddleware {
    validator: Arc<Validator>,
    enforce_responses: bool,
}

impl SwaggerMiddleware {
    #[must_use]
    pub fn new(validator: Arc<Validator>) -> Self {
        Self {
            validator,
            enforce_responses: true,
        }
    }

    #[must_use]
    pub fn enforce_responses(mut self, enforce: bool) -> Self {
        self.enforce_responses = enforce;
        self
    }
}

impl Middleware for SwaggerMiddleware {
    fn before(&self, req: &HandlerRequest) -> Option<HandlerResponse> {
        match self.validator.validate_request(req) {
            Ok(()) => None,
            Err(e) => {
                let status = e.status();
                if let ValidationError::Schema(defect) = &e {
                    error!(
                        request_id = %req.request_id,
                        handler = %req.handler_name,
                        error = %defect,
                        "Schema defect while validating request"
                    );
                } else {
                    info!(
                        request_id = %req.request_id,
                        handler = %req.handler_name,
                        status = status,
                        reason = %e.message(),
                        "Request rejected"
                    );
                }
                Some(e.to_response())
            }
        }
    }

    fn after(&self, req: &HandlerRequest, res: &mut HandlerResponse, _latency: Duration) {
        let Err(e) = self
            .validator
            .validate_response(req.operation.as_deref(), res)
        else {
            return;
        };
        if !self.enforce_responses {
            warn!(
                request_id = %req.request_id,
                handler = %req.handler_name,
                status = res.status,
                reason = %e.message(),
                "Response does not conform to schema"
            );
            return;
        }
        error!(
            request_id = %req.request_id,
            handler = %req.handler_name,
            status = res.status,
            reason = %e.message(),
            "Response does not conform to schema - replaced with 500"
        );
        *res = HandlerResponse::error(500, &e.message());
    }
}
