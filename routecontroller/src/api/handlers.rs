use crate::api::{schemas, ApiError, ApiState};
use crate::resources::common;
use axum::extract::State;
use axum::Json;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn routes(
    State(state): State<ApiState>,
) -> Result<Json<BTreeMap<String, Vec<schemas::Route>>>, ApiError> {
    let snapshot = state.snapshots.get().ok_or(ApiError::Uninitialized)?;

    let mut routes: BTreeMap<String, Vec<schemas::Route>> = BTreeMap::new();
    for route in &snapshot.routes {
        routes.entry(route.fqdn()).or_default().push(schemas::Route {
            name: route.name_any(),
            namespace: route.namespace().unwrap_or_default(),
            url: route.url(),
            destinations: route
                .spec
                .destinations
                .iter()
                .map(common::service_name)
                .collect(),
        });
    }
    Ok(Json(routes))
}

pub async fn sync(
    State(state): State<ApiState>,
    Json(request): Json<schemas::SyncRequest>,
) -> Result<Json<schemas::SyncResponse>, ApiError> {
    let snapshot = state.snapshots.get().ok_or(ApiError::Uninitialized)?;
    let labels = request.parent.spec.template.metadata.labels.unwrap_or_default();

    let children = state
        .children
        .render_children(&snapshot.routes, &labels)
        .map_err(ApiError::Render)?;
    Ok(Json(schemas::SyncResponse { children }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::tests::{destination, route};
    use crate::resources::common::Labels;
    use crate::resources::virtual_service::VirtualServiceRenderer;
    use crate::resources::Synthesizer;
    use crate::snapshot::{RouteSnapshot, SnapshotRepo};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    fn state() -> ApiState {
        ApiState {
            snapshots: Arc::new(SnapshotRepo::default()),
            children: Arc::new(Synthesizer::new(
                VirtualServiceRenderer::new(vec!["cf-system/istio-ingressgateway".into()]),
                Labels::new(),
            )),
        }
    }

    fn sync_request(labels: serde_json::Value) -> schemas::SyncRequest {
        serde_json::from_value(serde_json::json!({
            "parent": {"spec": {"template": {"metadata": {"labels": labels}}}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        assert_eq!(healthz().await, "ok");
    }

    #[tokio::test]
    async fn sync_before_first_pass_is_an_error() {
        let result = sync(State(state()), Json(sync_request(serde_json::json!({})))).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn uninitialized_error_message() {
        assert_eq!(
            ApiError::Uninitialized.to_string(),
            "uninitialized: have not yet synchronized with the route source"
        );
    }

    #[tokio::test]
    async fn sync_renders_children_with_template_labels() {
        let state = state();
        state.snapshots.put(RouteSnapshot::new(vec![route(
            "r1",
            "h",
            "d.com",
            "/p",
            vec![destination("x", 8080, None)],
        )]));

        let Json(response) = sync(
            State(state),
            Json(sync_request(serde_json::json!({"team": "routing"}))),
        )
        .await
        .unwrap();

        let kinds: Vec<_> = response
            .children
            .iter()
            .map(|child| child["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["VirtualService", "Service"]);
        for child in &response.children {
            assert_eq!(child["metadata"]["labels"]["team"], "routing");
            assert_eq!(
                child["metadata"]["labels"][common::MANAGED_BY_LABEL],
                common::MANAGER
            );
        }
    }

    #[tokio::test]
    async fn sync_tolerates_missing_labels() {
        let state = state();
        state.snapshots.put(RouteSnapshot::new(vec![]));

        let request: schemas::SyncRequest = serde_json::from_str(r#"{"parent": {}}"#).unwrap();
        let Json(response) = sync(State(state), Json(request)).await.unwrap();
        assert!(response.children.is_empty());
    }

    #[tokio::test]
    async fn routes_are_grouped_by_hostname() {
        let state = state();
        state.snapshots.put(RouteSnapshot::new(vec![
            route("r1", "h", "d.com", "/p", vec![destination("x", 8080, None)]),
            route("r2", "h", "d.com", "/q", vec![destination("y", 8080, None)]),
            route("r3", "g", "d.com", "", vec![]),
        ]));

        let Json(routes) = routes(State(state)).await.unwrap();

        assert_eq!(routes.keys().collect::<Vec<_>>(), vec!["g.d.com", "h.d.com"]);
        assert_eq!(
            routes["h.d.com"][0],
            schemas::Route {
                name: "r1".to_string(),
                namespace: "workload-namespace".to_string(),
                url: "h.d.com/p".to_string(),
                destinations: vec!["s-x".to_string()],
            }
        );
        assert!(routes["g.d.com"][0].destinations.is_empty());
    }
}
