//! Docker volume-plugin endpoints.
//!
//! One POST route per driver operation. Failures travel in the response's
//! embedded `Err` field with HTTP 200 — that field, not the status code,
//! is the error channel the orchestrator reads.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use silo_driver::SiloDriver;
use silo_driver::protocol::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, ErrorResponse, GetRequest, GetResponse,
    ListResponse, MountRequest, MountResponse, PathRequest, PathResponse, RemoveRequest,
    UnmountRequest, VolumeInfo,
};
use tower_http::trace::TraceLayer;

/// The plugin protocol router.
pub fn app(driver: Arc<SiloDriver>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .layer(TraceLayer::new_for_http())
        .with_state(driver)
}

async fn activate(State(driver): State<Arc<SiloDriver>>) -> Json<ActivateResponse> {
    Json(driver.activate())
}

async fn capabilities(State(driver): State<Arc<SiloDriver>>) -> Json<CapabilitiesResponse> {
    Json(driver.capabilities())
}

async fn create(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<CreateRequest>,
) -> Json<ErrorResponse> {
    Json(match driver.create(request) {
        Ok(()) => ErrorResponse::default(),
        Err(err) => ErrorResponse::error(err),
    })
}

async fn mount(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<MountRequest>,
) -> Json<MountResponse> {
    Json(match driver.mount(request).await {
        Ok(mountpoint) => MountResponse::mounted(&mountpoint),
        Err(err) => MountResponse::error(err),
    })
}

async fn unmount(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<UnmountRequest>,
) -> Json<ErrorResponse> {
    Json(match driver.unmount(request).await {
        Ok(()) => ErrorResponse::default(),
        Err(err) => ErrorResponse::error(err),
    })
}

async fn remove(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<RemoveRequest>,
) -> Json<ErrorResponse> {
    Json(match driver.remove(request).await {
        Ok(()) => ErrorResponse::default(),
        Err(err) => ErrorResponse::error(err),
    })
}

async fn get(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<GetRequest>,
) -> Json<GetResponse> {
    Json(match driver.get(request) {
        Ok(volume) => GetResponse {
            volume: VolumeInfo::from(&volume),
            err: String::new(),
        },
        Err(err) => GetResponse {
            volume: VolumeInfo::default(),
            err: err.to_string(),
        },
    })
}

async fn list(State(driver): State<Arc<SiloDriver>>) -> Json<ListResponse> {
    let volumes = driver.list().iter().map(VolumeInfo::from).collect();
    Json(ListResponse {
        volumes,
        err: String::new(),
    })
}

async fn path(
    State(driver): State<Arc<SiloDriver>>,
    Json(request): Json<PathRequest>,
) -> Json<PathResponse> {
    Json(match driver.path(request) {
        Ok(mountpoint) => PathResponse {
            mountpoint: mountpoint.display().to_string(),
            err: String::new(),
        },
        Err(err) => PathResponse {
            mountpoint: String::new(),
            err: err.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use silo_driver::DriverConfig;
    use silo_driver::mounter::ExecMounter;
    use silo_driver::probe::ExecProber;
    use tower::ServiceExt;

    async fn test_app(root: &std::path::Path) -> Router {
        let config = DriverConfig::with_mount_root(root);
        let driver = SiloDriver::new(
            config.clone(),
            Arc::new(ExecMounter::new(&config)),
            Arc::new(ExecProber::default()),
        )
        .await
        .unwrap();
        app(Arc::new(driver))
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn activate_advertises_volume_driver() {
        let root = tempfile::tempdir().unwrap();
        let (status, body) = post_json(test_app(root.path()).await, "/Plugin.Activate", "{}").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Implements"][0], "VolumeDriver");
    }

    #[tokio::test]
    async fn driver_errors_travel_in_the_err_field() {
        let root = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            test_app(root.path()).await,
            "/VolumeDriver.Create",
            r#"{"Name":"v1","Opts":{}}"#,
        )
        .await;

        // HTTP 200 even on failure; the embedded field carries the error.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Err"], "Missing mandatory 'source' field in 'Opts'");
    }

    #[tokio::test]
    async fn create_and_list_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let router = test_app(root.path()).await;

        let (_, body) = post_json(
            router.clone(),
            "/VolumeDriver.Create",
            r#"{"Name":"v1","Opts":{"source":"10.0.0.1"}}"#,
        )
        .await;
        assert_eq!(body["Err"], "");

        let (_, body) = post_json(router, "/VolumeDriver.List", "{}").await;
        assert_eq!(body["Volumes"][0]["Name"], "v1");
        assert_eq!(body["Volumes"][0]["Mountpoint"], "");
    }

    #[tokio::test]
    async fn capabilities_scope_is_local() {
        let root = tempfile::tempdir().unwrap();
        let (_, body) = post_json(
            test_app(root.path()).await,
            "/VolumeDriver.Capabilities",
            "{}",
        )
        .await;
        assert_eq!(body["Capabilities"]["Scope"], "local");
    }
}
