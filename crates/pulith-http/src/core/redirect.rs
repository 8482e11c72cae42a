//! Redirect decision logic, kept free of I/O.

use http::Method;
use url::Url;

use super::validation::is_redirect;
use crate::data::RedirectPolicy;
use crate::error::{FetchError, Result};

/// Facts about the current hop needed to decide on a redirect.
#[derive(Debug, Clone)]
pub struct RedirectContext<'a> {
    pub status: u16,
    pub location: Option<&'a str>,
    pub current_url: &'a Url,
    pub method: &'a Method,
    pub policy: RedirectPolicy,
    /// Redirects already followed to reach this hop.
    pub redirects: u32,
    pub max_redirects: u32,
    /// Whether the request body can only be sent once.
    pub live_body: bool,
}

/// What to do with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Hand the response to the caller unchanged.
    Deliver,
    /// Hand the response over with `Location` rewritten to this absolute URL.
    DeliverManual { location: Url },
    /// Issue a new request.
    Follow(FollowPlan),
}

/// The next request in a followed redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowPlan {
    pub location: Url,
    pub method: Method,
    /// Drop the body and `Content-Length` (303, or 301/302 after POST).
    pub drop_body: bool,
    pub redirects: u32,
}

/// Decide how to handle a response status.
///
/// Fails with [`FetchError::TooManyRedirects`] once the hop counter exceeds
/// the limit, [`FetchError::RedirectBlocked`] under the `error` policy, and
/// [`FetchError::BodyUsed`] when a live body would have to be sent again.
pub fn decide_redirect(ctx: &RedirectContext<'_>) -> Result<RedirectAction> {
    if !is_redirect(ctx.status) {
        return Ok(RedirectAction::Deliver);
    }
    if ctx.redirects > ctx.max_redirects {
        return Err(FetchError::TooManyRedirects);
    }

    let location = ctx
        .location
        .map(|loc| ctx.current_url.join(loc))
        .transpose()?;

    match ctx.policy {
        RedirectPolicy::Error => Err(FetchError::RedirectBlocked),
        RedirectPolicy::Manual => Ok(match location {
            Some(location) => RedirectAction::DeliverManual { location },
            None => RedirectAction::Deliver,
        }),
        RedirectPolicy::Follow => {
            let Some(location) = location else {
                return Ok(RedirectAction::Deliver);
            };
            if ctx.status != 303 && ctx.live_body {
                return Err(FetchError::BodyUsed);
            }

            let downgrade = ctx.status == 303
                || (matches!(ctx.status, 301 | 302) && *ctx.method == Method::POST);
            Ok(RedirectAction::Follow(FollowPlan {
                location,
                method: if downgrade { Method::GET } else { ctx.method.clone() },
                drop_body: downgrade,
                redirects: ctx.redirects + 1,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/a/b?q=1").unwrap()
    }

    fn ctx<'a>(url: &'a Url, method: &'a Method, status: u16, location: Option<&'a str>) -> RedirectContext<'a> {
        RedirectContext {
            status,
            location,
            current_url: url,
            method,
            policy: RedirectPolicy::Follow,
            redirects: 0,
            max_redirects: 5,
            live_body: false,
        }
    }

    #[test]
    fn non_redirect_is_delivered() {
        let url = base();
        let get = Method::GET;
        assert_eq!(decide_redirect(&ctx(&url, &get, 200, Some("/x"))).unwrap(), RedirectAction::Deliver);
        assert_eq!(decide_redirect(&ctx(&url, &get, 304, Some("/x"))).unwrap(), RedirectAction::Deliver);
    }

    #[test]
    fn relative_location_resolves_against_current_url() {
        let url = base();
        let get = Method::GET;
        let RedirectAction::Follow(plan) = decide_redirect(&ctx(&url, &get, 302, Some("../c"))).unwrap() else {
            panic!("expected follow");
        };
        assert_eq!(plan.location.as_str(), "https://example.com/c");
        assert_eq!(plan.method, Method::GET);
        assert_eq!(plan.redirects, 1);
        assert!(!plan.drop_body);
    }

    #[test]
    fn missing_location_is_delivered() {
        let url = base();
        let get = Method::GET;
        assert_eq!(decide_redirect(&ctx(&url, &get, 301, None)).unwrap(), RedirectAction::Deliver);
    }

    #[test]
    fn counter_over_limit_fails() {
        let url = base();
        let get = Method::GET;
        let mut c = ctx(&url, &get, 302, Some("/next"));
        c.redirects = 5;
        assert!(matches!(decide_redirect(&c), Ok(RedirectAction::Follow(_))));
        c.redirects = 6;
        assert_eq!(decide_redirect(&c).unwrap_err(), FetchError::TooManyRedirects);
    }

    #[test]
    fn error_policy_blocks() {
        let url = base();
        let get = Method::GET;
        let mut c = ctx(&url, &get, 307, None);
        c.policy = RedirectPolicy::Error;
        assert_eq!(decide_redirect(&c).unwrap_err(), FetchError::RedirectBlocked);
    }

    #[test]
    fn manual_policy_rewrites_location() {
        let url = base();
        let get = Method::GET;
        let mut c = ctx(&url, &get, 301, Some("/moved"));
        c.policy = RedirectPolicy::Manual;
        let action = decide_redirect(&c).unwrap();
        assert_eq!(
            action,
            RedirectAction::DeliverManual {
                location: Url::parse("https://example.com/moved").unwrap()
            }
        );
    }

    #[test]
    fn see_other_downgrades_to_get() {
        let url = base();
        let put = Method::PUT;
        let mut c = ctx(&url, &put, 303, Some("/done"));
        c.live_body = true;
        let RedirectAction::Follow(plan) = decide_redirect(&c).unwrap() else {
            panic!("expected follow");
        };
        assert_eq!(plan.method, Method::GET);
        assert!(plan.drop_body);
    }

    #[test]
    fn post_downgrades_on_301_and_302_only() {
        let url = base();
        let post = Method::POST;
        for status in [301, 302] {
            let RedirectAction::Follow(plan) = decide_redirect(&ctx(&url, &post, status, Some("/p"))).unwrap() else {
                panic!("expected follow");
            };
            assert_eq!(plan.method, Method::GET);
            assert!(plan.drop_body);
        }
        for status in [307, 308] {
            let RedirectAction::Follow(plan) = decide_redirect(&ctx(&url, &post, status, Some("/p"))).unwrap() else {
                panic!("expected follow");
            };
            assert_eq!(plan.method, Method::POST);
            assert!(!plan.drop_body);
        }
    }

    #[test]
    fn live_body_cannot_be_resent() {
        let url = base();
        let post = Method::POST;
        let mut c = ctx(&url, &post, 307, Some("/again"));
        c.live_body = true;
        assert_eq!(decide_redirect(&c).unwrap_err(), FetchError::BodyUsed);
    }
}
