/// The call a middleware is looking at.
///
/// Middleware may rewrite either field. On a client, the rewritten `service`
/// and `method` decide where the call is sent; on a service, the rewritten
/// `method` decides which handler runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Target service. On the service side this is the configured service
    /// name, empty when none was set.
    pub service: String,
    pub method: String,
}

impl CallContext {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }
}

/// Restricts a middleware to calls for one service and/or one method.
///
/// An unset field matches everything. Filters are checked against the
/// context as it stands when the middleware's turn comes, so an earlier
/// rewrite can opt a call in or out of later middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareFilter {
    pub service: Option<String>,
    pub method: Option<String>,
}

impl MiddlewareFilter {
    /// Match every call.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn matches(&self, context: &CallContext) -> bool {
        let service_ok = self
            .service
            .as_deref()
            .is_none_or(|service| service == context.service);
        let method_ok = self
            .method
            .as_deref()
            .is_none_or(|method| method == context.method);
        service_ok && method_ok
    }
}
