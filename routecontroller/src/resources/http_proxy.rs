use crate::resources::{Backends, FqdnGroup, Renderer, PLACEHOLDER_DESTINATION};
use crds::{
    HeaderValue, HeadersPolicy, HttpProxy, HttpProxySpec, MatchCondition, ProxyRoute,
    ProxyService, Tls, VirtualHost,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Port of the placeholder backend.
pub const DEFAULT_BACKEND_PORT: i32 = 8080;

#[derive(Clone, Debug, Default)]
pub struct HttpProxyRenderer {
    tls_secret_name: Option<String>,
    https_only: bool,
}

impl HttpProxyRenderer {
    pub fn new(tls_secret_name: Option<String>, https_only: bool) -> Self {
        Self {
            tls_secret_name,
            https_only,
        }
    }

    fn tls(&self, group: &FqdnGroup<'_>) -> Option<Tls> {
        if group.internal {
            return None;
        }
        self.tls_secret_name.as_ref().map(|secret_name| Tls {
            secret_name: secret_name.clone(),
        })
    }
}

impl Renderer for HttpProxyRenderer {
    type Object = HttpProxy;

    const NAME_PREFIX: &'static str = "hp-";

    const REQUIRE_WEIGHT_SUM: bool = false;

    fn render(&self, group: &FqdnGroup<'_>, metadata: ObjectMeta) -> HttpProxy {
        let tls = self.tls(group);
        let permit_insecure = tls.as_ref().map(|_| !self.https_only);

        let routes = group
            .rules
            .iter()
            .map(|rule| ProxyRoute {
                conditions: rule
                    .path
                    .map(|prefix| {
                        vec![MatchCondition {
                            prefix: prefix.to_string(),
                        }]
                    })
                    .unwrap_or_default(),
                services: match &rule.backends {
                    Backends::Placeholder => vec![ProxyService {
                        name: PLACEHOLDER_DESTINATION.to_string(),
                        port: DEFAULT_BACKEND_PORT,
                        ..Default::default()
                    }],
                    Backends::Weighted(backends) => backends
                        .iter()
                        .map(|backend| ProxyService {
                            name: backend.service_name.clone(),
                            port: backend.destination.port.unwrap_or(DEFAULT_BACKEND_PORT),
                            weight: Some(i64::from(backend.weight)),
                            request_headers_policy: Some(HeadersPolicy {
                                set: backend
                                    .headers
                                    .iter()
                                    .map(|(name, value)| HeaderValue {
                                        name: name.to_string(),
                                        value: value.clone(),
                                    })
                                    .collect(),
                            }),
                        })
                        .collect(),
                },
                permit_insecure,
            })
            .collect();

        HttpProxy {
            metadata,
            spec: HttpProxySpec {
                virtualhost: Some(VirtualHost {
                    fqdn: group.fqdn.to_string(),
                    tls,
                }),
                routes,
            },
        }
    }
}
