use std::ffi::CStr;

use log::debug;

use crate::{address::SENTINEL_HOST, Interceptor};

/// The name-resolution primitives sitting behind the interceptor.
///
/// Output types are whatever the underlying API hands back; the interceptor
/// never inspects them.
pub trait Resolver {
    type Host;
    type AddrInfo;
    type Hints;

    fn host_by_name(&self, name: &CStr) -> Self::Host;
    fn addr_info(
        &self,
        node: Option<&CStr>,
        service: Option<&CStr>,
        hints: Option<&Self::Hints>,
    ) -> Self::AddrInfo;
}

impl Interceptor {
    /// Records `name` as pending and resolves the sentinel in its place.
    pub fn resolve_by_name<R: Resolver>(&self, resolver: &R, name: &CStr) -> R::Host {
        self.pending.record(name.to_bytes());
        debug!("resolve {:?} as sentinel", name);
        resolver.host_by_name(SENTINEL_HOST)
    }

    /// Records `node` as pending and resolves the sentinel in its place,
    /// forwarding `service` and `hints` untouched.
    ///
    /// A lookup without a node (a passive lookup for binding) is not a
    /// hostname and goes straight through.
    pub fn resolve_full<R: Resolver>(
        &self,
        resolver: &R,
        node: Option<&CStr>,
        service: Option<&CStr>,
        hints: Option<&R::Hints>,
    ) -> R::AddrInfo {
        let Some(node) = node else {
            return resolver.addr_info(None, service, hints);
        };
        self.pending.record(node.to_bytes());
        debug!("resolve {:?} as sentinel", node);
        resolver.addr_info(Some(SENTINEL_HOST), service, hints)
    }
}
