//! Service addressing
//!
//! A call targets a service and a procedure. Bindings pick one of two ways to
//! carry the service name; neither changes the envelope's structure:
//!
//! - **MethodPrefix**: the service is folded into the method name as
//!   `service.method`, and the receiving side splits it back out.
//! - **Destination**: the service travels out of band as a destination tag,
//!   a URL suffix for request/response transports or a channel suffix such as
//!   `call:echo` for socket transports.
//!
//! All functions here are pure.

use crate::types::Request;

/// How the service name travels with a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Addressing {
    /// `service.method` inside the envelope
    MethodPrefix,
    /// Out-of-band destination tag (URL or channel suffix)
    #[default]
    Destination,
}

/// Fold `service` into `method` as `service.method`
///
/// An empty service leaves the method unchanged.
pub fn prefix_method(service: &str, method: &str) -> String {
    if service.is_empty() {
        method.to_string()
    } else {
        format!("{}.{}", service, method)
    }
}

/// Channel tag for a socket call: `base` or `base:service`
pub fn channel_tag(base: &str, service: &str) -> String {
    if service.is_empty() {
        base.to_string()
    } else {
        format!("{}:{}", base, service)
    }
}

/// Service named by a channel tag, if the tag belongs to `base`
///
/// `call` → `Some("")`, `call:echo` → `Some("echo")`, `other` → `None`.
pub fn service_from_channel<'a>(base: &str, tag: &'a str) -> Option<&'a str> {
    if tag == base {
        return Some("");
    }
    tag.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(':'))
}

/// Split a `service.method` name back into its parts
///
/// If the method holds a dot after its first character, the part before the
/// first dot replaces `service` and the remainder becomes the method.
/// Otherwise the request is returned as is.
pub fn split_method(service: &str, mut request: Request) -> (String, Request) {
    match request.method.find('.') {
        Some(dot) if dot > 0 => {
            let method = request.method[dot + 1..].to_string();
            let service = request.method[..dot].to_string();
            request.method = method;
            (service, request)
        }
        _ => (service.to_string(), request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_method() {
        assert_eq!(prefix_method("echo", "echo"), "echo.echo");
        assert_eq!(prefix_method("", "get"), "get");
    }

    #[test]
    fn test_channel_tags() {
        assert_eq!(channel_tag("call", ""), "call");
        assert_eq!(channel_tag("call", "echo"), "call:echo");
        assert_eq!(service_from_channel("call", "call"), Some(""));
        assert_eq!(service_from_channel("call", "call:echo"), Some("echo"));
        assert_eq!(service_from_channel("call", "caller"), None);
        assert_eq!(service_from_channel("call", "return"), None);
    }

    #[test]
    fn test_split_method() {
        let (service, request) = split_method("", Request::new("echo.echo", vec![], None));
        assert_eq!(service, "echo");
        assert_eq!(request.method, "echo");

        let (service, request) = split_method("", Request::new("get", vec![], None));
        assert_eq!(service, "");
        assert_eq!(request.method, "get");
    }

    #[test]
    fn test_leading_dot_is_not_a_prefix() {
        let (service, request) = split_method("svc", Request::new(".hidden", vec![], None));
        assert_eq!(service, "svc");
        assert_eq!(request.method, ".hidden");
    }
}
