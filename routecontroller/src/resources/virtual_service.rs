use crate::resources::{Backends, FqdnGroup, Renderer, PLACEHOLDER_DESTINATION};
use crds::{
    Destination, HeaderOperations, Headers, HttpMatchRequest, HttpRoute, HttpRouteDestination,
    StringMatch, VirtualService, VirtualServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// "mesh" is the reserved Istio gateway name for sidecar-to-sidecar traffic.
pub const MESH_INTERNAL_GATEWAY: &str = "mesh";

#[derive(Clone, Debug, Default)]
pub struct VirtualServiceRenderer {
    gateways: Vec<String>,
}

impl VirtualServiceRenderer {
    pub fn new(gateways: Vec<String>) -> Self {
        Self { gateways }
    }
}

impl Renderer for VirtualServiceRenderer {
    type Object = VirtualService;

    const NAME_PREFIX: &'static str = "vs-";

    // Istio rejects weights that do not add up to 100
    const REQUIRE_WEIGHT_SUM: bool = true;

    fn render(&self, group: &FqdnGroup<'_>, metadata: ObjectMeta) -> VirtualService {
        let gateways = if group.internal {
            vec![MESH_INTERNAL_GATEWAY.to_string()]
        } else {
            self.gateways.clone()
        };

        let http = group
            .rules
            .iter()
            .map(|rule| HttpRoute {
                matches: rule
                    .path
                    .map(|prefix| {
                        vec![HttpMatchRequest {
                            uri: StringMatch {
                                prefix: prefix.to_string(),
                            },
                        }]
                    })
                    .unwrap_or_default(),
                route: match &rule.backends {
                    Backends::Placeholder => vec![HttpRouteDestination {
                        destination: Destination {
                            host: PLACEHOLDER_DESTINATION.to_string(),
                        },
                        ..Default::default()
                    }],
                    Backends::Weighted(backends) => backends
                        .iter()
                        .map(|backend| HttpRouteDestination {
                            destination: Destination {
                                host: backend.service_name.clone(),
                            },
                            weight: Some(backend.weight),
                            headers: Some(Headers {
                                request: Some(HeaderOperations {
                                    set: backend
                                        .headers
                                        .iter()
                                        .map(|(name, value)| (name.to_string(), value.clone()))
                                        .collect(),
                                }),
                            }),
                        })
                        .collect(),
                },
            })
            .collect();

        VirtualService {
            metadata,
            spec: VirtualServiceSpec {
                hosts: vec![group.fqdn.to_string()],
                gateways,
                http,
            },
        }
    }
}
