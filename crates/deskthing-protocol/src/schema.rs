//! Channel vocabularies and the generic validator.
//!
//! Every channel declares, per scope, the closed set of domains it accepts
//! and the requests each domain accepts. Validation resolves the domain
//! first and fails fast when it is unknown, then resolves the request
//! (falling back to the domain's default when one is declared), and only
//! then decodes the payload into the exact type for that pair.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::{Channel, EnvelopeMeta, RawEnvelope, RouteKey, Scope, TypedEnvelope};
use crate::error::SchemaError;
use crate::upgrade::upgrade;

/// Request set of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requests {
    /// Coarse-only domain; any request field is ignored.
    None,
    /// Closed request set. `default` is used when the request is omitted;
    /// without one the request is mandatory.
    Closed {
        names: &'static [&'static str],
        default: Option<&'static str>,
    },
    /// Free-form request, e.g. a target app id or a log level label.
    Open { required: bool },
}

/// Declaration of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainSpec {
    pub domain: &'static str,
    pub requests: Requests,
}

impl DomainSpec {
    pub const fn coarse(domain: &'static str) -> Self {
        Self {
            domain,
            requests: Requests::None,
        }
    }

    pub const fn closed(domain: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            domain,
            requests: Requests::Closed {
                names,
                default: None,
            },
        }
    }

    pub const fn with_default(
        domain: &'static str,
        names: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            domain,
            requests: Requests::Closed {
                names,
                default: Some(default),
            },
        }
    }

    pub const fn open(domain: &'static str, required: bool) -> Self {
        Self {
            domain,
            requests: Requests::Open { required },
        }
    }

    /// Whether a registry key for `request` names something this domain
    /// can produce. `None` is the domain wildcard and is always declared.
    pub fn declares(&self, request: Option<&str>) -> bool {
        match (self.requests, request) {
            (_, None) => true,
            (Requests::None, Some(_)) => false,
            (Requests::Closed { names, .. }, Some(request)) => names.contains(&request),
            (Requests::Open { .. }, Some(_)) => true,
        }
    }
}

/// Domains a channel accepts in one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    Closed(&'static [DomainSpec]),
    /// Anything goes; used for traffic the host only forwards.
    Open,
}

impl Vocabulary {
    pub fn find(&self, domain: &str) -> Option<&'static DomainSpec> {
        match *self {
            Self::Closed(specs) => specs.iter().find(|spec| spec.domain == domain),
            Self::Open => None,
        }
    }

    /// Whether a registry key is declared by this vocabulary.
    pub fn declares(&self, domain: &str, request: Option<&str>) -> bool {
        match self {
            Self::Open => true,
            Self::Closed(_) => self
                .find(domain)
                .is_some_and(|spec| spec.declares(request)),
        }
    }
}

/// A typed message union for one channel.
pub trait Message: Sized + Send + 'static {
    /// The channel this union describes.
    const CHANNEL: Channel;

    /// Domains accepted in `scope`.
    fn vocabulary(scope: Scope) -> Vocabulary;

    /// Builds the variant for an already resolved route.
    fn decode(route: &RouteKey, raw: &RawEnvelope) -> Result<Self, SchemaError>;

    /// Rewrites deprecated shapes of this channel onto current ones.
    ///
    /// Must leave canonical envelopes untouched.
    fn upgrade_legacy(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
        Ok(raw)
    }
}

/// Resolves the route of `raw` against a vocabulary.
pub fn resolve_route(
    channel: Channel,
    vocabulary: Vocabulary,
    scope: Scope,
    raw: &RawEnvelope,
) -> Result<RouteKey, SchemaError> {
    let spec = match vocabulary {
        Vocabulary::Open => {
            return Ok(RouteKey::new(scope, raw.domain.as_str(), raw.request.as_deref()));
        }
        Vocabulary::Closed(_) => {
            vocabulary
                .find(&raw.domain)
                .ok_or_else(|| SchemaError::UnknownDomain {
                    channel,
                    domain: raw.domain.clone(),
                })?
        }
    };

    let unknown_request = || SchemaError::UnknownRequest {
        channel,
        domain: raw.domain.clone(),
        request: raw.request.clone(),
    };

    let request = match (spec.requests, raw.request.as_deref()) {
        (Requests::None, _) => None,
        (Requests::Closed { names, .. }, Some(request)) => {
            if !names.contains(&request) {
                return Err(unknown_request());
            }
            Some(request)
        }
        (Requests::Closed { default, .. }, None) => Some(default.ok_or_else(unknown_request)?),
        (Requests::Open { .. }, Some(request)) => Some(request),
        (Requests::Open { required: true }, None) => return Err(unknown_request()),
        (Requests::Open { required: false }, None) => None,
    };

    Ok(RouteKey::new(scope, spec.domain, request))
}

/// Validates a raw envelope against channel `M`.
///
/// Upgrades legacy shapes first, so only canonical variants are produced.
pub fn validate<M: Message>(raw: RawEnvelope) -> Result<TypedEnvelope<M>, SchemaError> {
    let raw = upgrade::<M>(raw)?;
    let scope = raw.scope();
    let route = resolve_route(M::CHANNEL, M::vocabulary(scope), scope, &raw)?;
    let message = M::decode(&route, &raw)?;

    let client_id = raw.correlation_id().map(str::to_string);
    Ok(TypedEnvelope {
        route,
        meta: EnvelopeMeta {
            channel: M::CHANNEL,
            app: raw.app,
            source: raw.source,
            version: raw.version,
            client_id,
            upgraded_from: raw.upgraded_from,
        },
        message,
    })
}

/// Decodes the payload of `raw` as `T`.
///
/// A missing payload is decoded from `null`, so `Option<T>` payloads accept
/// it and required payloads report a shape mismatch.
pub fn payload<T: DeserializeOwned>(route: &RouteKey, raw: &RawEnvelope) -> Result<T, SchemaError> {
    let value = raw.payload.clone().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| SchemaError::shape(&route.domain, route.request.as_deref(), e))
}

/// Requires a client id on the envelope or in its payload.
pub fn require_client_id<'a>(route: &RouteKey, raw: &'a RawEnvelope) -> Result<&'a str, SchemaError> {
    raw.correlation_id()
        .ok_or_else(|| SchemaError::MissingCorrelationId {
            domain: route.domain.clone(),
            request: route.request.clone().unwrap_or_default(),
        })
}

/// Error for a request that the vocabulary declared but the decoder does
/// not handle. Indicates a vocabulary/decoder mismatch inside this crate.
pub(crate) fn undeclared(channel: Channel, route: &RouteKey) -> SchemaError {
    SchemaError::UnknownRequest {
        channel,
        domain: route.domain.clone(),
        request: route.request.clone(),
    }
}

/// Deserializes a value that can be either a single string or a list of
/// strings.
pub fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrVec;

    impl<'de> de::Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or a sequence of strings")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Vec<String>, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<S: de::SeqAccess<'de>>(self, mut seq: S) -> Result<Vec<String>, S::Error> {
            let mut v = Vec::new();
            while let Some(s) = seq.next_element()? {
                v.push(s);
            }
            Ok(v)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// One or many ids, as accepted by delete requests.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct IdList(#[serde(deserialize_with = "string_or_vec")] pub Vec<String>);

/// Panics unless `fixtures` exercises every domain of `vocabulary` and
/// every request of its closed request sets.
#[cfg(test)]
pub(crate) fn assert_covers<'a>(
    vocabulary: &[DomainSpec],
    fixtures: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) {
    let seen: Vec<_> = fixtures.into_iter().collect();
    for spec in vocabulary {
        assert!(
            seen.iter().any(|(domain, _)| *domain == spec.domain),
            "no fixture for {}",
            spec.domain
        );
        if let Requests::Closed { names, .. } = spec.requests {
            for name in names {
                assert!(
                    seen.iter()
                        .any(|(domain, request)| *domain == spec.domain && *request == Some(*name)),
                    "no fixture for {}/{}",
                    spec.domain,
                    name
                );
            }
        }
    }
}
