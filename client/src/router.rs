//! Dispatch of decoded packets to registered handlers
//!
//! Handlers are registered once, at construction, under a command or event
//! name and an origin filter. Every matching handler runs, in registration
//! order. Responses are routed by the name of the request they answer, so a
//! handler registered for `admin.listPlayers` sees the `OK ...` reply.

use log::debug;
use rcon_shared::{Origin, Packet};
use std::collections::HashMap;
use std::fmt;

/// Receives the request (when the packet answers one) and the packet itself
pub type Handler = Box<dyn Fn(Option<&Packet>, &Packet) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginFilter {
    Any,
    Only(Origin),
}

impl OriginFilter {
    fn matches(self, origin: Origin) -> bool {
        match self {
            Self::Any => true,
            Self::Only(expected) => expected == origin,
        }
    }
}

impl From<Origin> for OriginFilter {
    fn from(origin: Origin) -> Self {
        Self::Only(origin)
    }
}

struct Route {
    filter: OriginFilter,
    handler: Handler,
}

/// Read-only handler registry built by [`RouterBuilder`]
pub struct Router {
    routes: HashMap<String, Vec<Route>>,
    unhandled: Option<Handler>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.routes.keys().collect();
        names.sort();
        f.debug_struct("Router").field("routes", &names).finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        RouterBuilder::new().build()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Name a packet is routed under
    fn route_name<'a>(request: Option<&'a Packet>, packet: &'a Packet) -> Option<&'a str> {
        match request {
            Some(request) => request.command(),
            None => packet.command(),
        }
    }

    /// Invokes every matching handler and returns how many ran
    pub fn dispatch(&self, request: Option<&Packet>, packet: &Packet) -> usize {
        let mut matched = 0;
        if let Some(routes) = Self::route_name(request, packet).and_then(|name| self.routes.get(name)) {
            for route in routes.iter().filter(|route| route.filter.matches(packet.origin)) {
                (route.handler)(request, packet);
                matched += 1;
            }
        }

        if matched == 0 {
            match &self.unhandled {
                Some(hook) => hook(request, packet),
                None => debug!("Unhandled packet {}", packet),
            }
        }

        matched
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.routes.get(name).map_or(0, Vec::len)
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<String, Vec<Route>>,
    unhandled: Option<Handler>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, name: impl Into<String>, filter: impl Into<OriginFilter>, handler: F) -> Self
    where
        F: Fn(Option<&Packet>, &Packet) + Send + Sync + 'static,
    {
        self.routes.entry(name.into()).or_default().push(Route {
            filter: filter.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Hook for packets no handler matched; diagnostics only
    pub fn on_unhandled<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&Packet>, &Packet) + Send + Sync + 'static,
    {
        self.unhandled = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
            unhandled: self.unhandled,
        }
    }
}
