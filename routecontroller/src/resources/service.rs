use crate::resources::common::{self, Labels};
use crds::Route;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use log::warn;
use std::collections::BTreeMap;

pub const APP_GUID_LABEL: &str = "cloudfoundry.org/app_guid";
pub const PROCESS_TYPE_LABEL: &str = "cloudfoundry.org/process_type";
pub const ROUTE_GUID_LABEL: &str = "cloudfoundry.org/route_guid";
pub const ROUTE_FQDN_ANNOTATION: &str = "cloudfoundry.org/route-fqdn";

const HTTP_PORT_NAME: &str = "http";

/// One backend Service per destination of `route`, owned by the route.
pub fn build(route: &Route, template: &Labels) -> Vec<Service> {
    route
        .spec
        .destinations
        .iter()
        .filter_map(|destination| {
            let Some(port) = destination.port else {
                warn!(
                    "Destination {} of route {} has no port, skipping its service",
                    destination.guid,
                    route.name_any()
                );
                return None;
            };

            let mut labels = common::clone_labels(template);
            labels.insert(APP_GUID_LABEL.to_string(), destination.app.guid.clone());
            labels.insert(
                PROCESS_TYPE_LABEL.to_string(),
                destination.app.process.process_type.clone(),
            );
            labels.insert(ROUTE_GUID_LABEL.to_string(), route.name_any());

            Some(Service {
                metadata: ObjectMeta {
                    name: Some(common::service_name(destination)),
                    namespace: route.namespace(),
                    labels: Some(labels),
                    annotations: Some(BTreeMap::from([(
                        ROUTE_FQDN_ANNOTATION.to_string(),
                        route.fqdn(),
                    )])),
                    owner_references: Some(vec![common::route_owner_ref(route)]),
                    ..Default::default()
                },
                spec: Some(ServiceSpec {
                    selector: Some(destination.selector.match_labels.clone()),
                    // protocol and targetPort are the API server defaults, spelled
                    // out so an unchanged service compares equal to the live one
                    ports: Some(vec![ServicePort {
                        name: Some(HTTP_PORT_NAME.to_string()),
                        port,
                        protocol: Some("TCP".to_string()),
                        target_port: Some(IntOrString::Int(port)),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}
