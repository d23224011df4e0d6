//! Middleware (spec §4.7, C7): an onion-style chain wrapping the
//! dispatcher's provider traversal, run once per incoming request even for
//! backgrounded calls (middleware runs at submission time; the function
//! body runs later, in the worker).

use async_trait::async_trait;
use mcp_protocol::McpResult;
use serde_json::Value;

use crate::context::Context;
use crate::handler::BoxFuture;

/// What kind of request is flowing through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    CallTool,
    ReadResource,
    GetPrompt,
    ListTools,
    ListResources,
    ListResourceTemplates,
    ListPrompts,
}

/// The message a middleware may inspect or modify before it reaches the
/// provider traversal.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub kind: RequestKind,
    pub target: Option<String>,
    pub params: Value,
}

pub type NextFn = Box<dyn FnOnce(MiddlewareContext) -> BoxFuture<'static, McpResult<Value>> + Send>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: MiddlewareContext, context: Context, next: NextFn) -> McpResult<Value>;
}

/// The registered chain. `fold` wraps the innermost continuation (the
/// provider traversal) with each middleware in reverse registration order,
/// so that running the resulting closure executes middleware in forward
/// registration order on the way in and reverse order on the way out (spec
/// §4.7, §5 "Ordering").
pub struct MiddlewareChain {
    middlewares: Vec<std::sync::Arc<dyn Middleware>>,
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self { middlewares: Vec::new() }
    }

    pub fn push(&mut self, middleware: std::sync::Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub async fn run(
        &self,
        ctx: MiddlewareContext,
        context: Context,
        innermost: NextFn,
    ) -> McpResult<Value> {
        let mut next = innermost;
        for middleware in self.middlewares.iter().rev().cloned() {
            let prior = next;
            let inner_context = context.clone();
            next = Box::new(move |mc: MiddlewareContext| -> BoxFuture<'static, McpResult<Value>> {
                Box::pin(async move { middleware.handle(mc, inner_context, prior).await })
            });
        }
        next(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_session_storage::InMemoryStateStore;
    use std::sync::Arc;

    fn context() -> Context {
        Context::new(
            crate::context::RequestIdentity {
                request_id: "r1".into(),
                session_id: "s1".into(),
                client_id: None,
            },
            crate::context::ServerServices {
                state_store: Arc::new(InMemoryStateStore::new()),
                queue: None,
                sampler: None,
                elicitor: None,
                dispatcher: None,
                notifications: Arc::new(|_| {}),
            },
        )
    }

    struct RecordingMiddleware {
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        label: &'static str,
    }

    #[async_trait]
    impl Middleware for RecordingMiddleware {
        async fn handle(&self, ctx: MiddlewareContext, context: Context, next: NextFn) -> McpResult<Value> {
            self.order.lock().unwrap().push(self.label);
            let result = next(ctx).await;
            self.order.lock().unwrap().push(self.label);
            let _ = &context;
            result
        }
    }

    #[tokio::test]
    async fn middleware_runs_in_registration_order_before_and_reverse_after() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RecordingMiddleware { order: order.clone(), label: "a" }));
        chain.push(Arc::new(RecordingMiddleware { order: order.clone(), label: "b" }));

        let innermost: NextFn = Box::new(|_mc| Box::pin(async { Ok(Value::Null) }));
        let mc = MiddlewareContext { kind: RequestKind::CallTool, target: None, params: Value::Null };
        chain.run(mc, context(), innermost).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "b", "a"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        struct ShortCircuit;
        #[async_trait]
        impl Middleware for ShortCircuit {
            async fn handle(&self, _ctx: MiddlewareContext, _context: Context, _next: NextFn) -> McpResult<Value> {
                Ok(Value::String("short-circuited".into()))
            }
        }
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(ShortCircuit));
        let innermost: NextFn = Box::new(|_mc| Box::pin(async { panic!("should not reach provider traversal") }));
        let mc = MiddlewareContext { kind: RequestKind::CallTool, target: None, params: Value::Null };
        let result = chain.run(mc, context(), innermost).await.unwrap();
        assert_eq!(result, Value::String("short-circuited".into()));
    }
}
