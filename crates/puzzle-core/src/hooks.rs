//! Page lifecycle hooks.
//!
//! A page template may need to observe its own lifecycle: creation at
//! compile time, each incoming request, every streamed chunk, and response
//! completion. Hooks are supplied statically by the embedding application
//! when a template is compiled; templates never carry executable code.

use crate::context::RequestContext;

/// Lifecycle callbacks for a compiled page.
///
/// All methods default to no-ops, so implementors override only what they
/// observe. The hook receiver lives as long as the compiled template and may
/// keep its own state; callers issuing requests in parallel must provide
/// their own synchronization around it.
pub trait PageHooks: Send {
    /// Called once, after the template has been compiled.
    fn on_create(&mut self) {}

    /// Called at the start of every request.
    fn on_request(&mut self, _req: &RequestContext) {}

    /// Called with each chunk's HTML before it is written.
    fn on_chunk(&mut self, _html: &str) {}

    /// Called after the response has been completed.
    fn on_response_end(&mut self) {}
}

/// A hook receiver that observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PageHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Method;

    #[derive(Default)]
    struct Recorder {
        events: Vec<&'static str>,
    }

    impl PageHooks for Recorder {
        fn on_create(&mut self) {
            self.events.push("create");
        }

        fn on_request(&mut self, _req: &RequestContext) {
            self.events.push("request");
        }

        fn on_response_end(&mut self) {
            self.events.push("end");
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let mut hooks = NoopHooks;
        hooks.on_create();
        hooks.on_request(&RequestContext::new(Method::Get, "/"));
        hooks.on_chunk("<div></div>");
        hooks.on_response_end();
    }

    #[test]
    fn test_overridden_hooks_observe_lifecycle() {
        let mut hooks = Recorder::default();
        hooks.on_create();
        hooks.on_request(&RequestContext::new(Method::Get, "/"));
        hooks.on_chunk("<div></div>");
        hooks.on_response_end();
        assert_eq!(hooks.events, vec!["create", "request", "end"]);
    }
}
