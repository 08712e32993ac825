/*!
 * HTTP routes of the Model 240 gateway.
 *
 * Path integers are extracted as `i64` so out-of-range channels and indices
 * reach the façade's validation and come back as typed 400 responses. Input
 * that does not decode at all is rejected by the extractors in
 * [`crate::extract`] with the same body shape.
 */
use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use model240_devices::types::{
    ChannelStatus, CurveDataPoint, CurveDataPoints, CurveHeader, Identification, InputConfig,
    MonitorReading,
};
use model240_devices::{ConnectOutcome, DisconnectOutcome};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::schemas::{
    BrightnessBody, BrightnessQuery, ConnectionState, ModuleName, ModuleNameQuery,
    OperationResult,
};
use crate::AppState;

/// Build the application router
pub fn router(state: AppState, cors_permissive: bool) -> Router {
    let device = Router::new()
        .route("/connect", post(connect).put(connect))
        .route("/disconnect", post(disconnect).put(disconnect))
        .route("/connection", get(connection))
        .route("/identification", get(identification))
        .route("/{channel}/status", get(channel_status))
        .route("/module-name", get(module_name).put(set_module_name))
        .route("/brightness", get(brightness).put(set_brightness))
        .route("/factory-defaults", delete(factory_reset));

    let curve = Router::new()
        .route("/{channel}", delete(delete_curve))
        .route("/{channel}/header", get(curve_header).put(set_curve_header))
        .route(
            "/{channel}/data-point/{index}",
            get(curve_data_point).put(set_curve_data_point),
        )
        .route("/{channel}/data-points", get(curve_data_points));

    let app = Router::new()
        .nest("/device", device)
        .nest("/curve", curve)
        .route("/input/{channel}", get(input_config).put(set_input_config))
        .route("/sensor-units/{channel}", get(sensor_units))
        .route("/{channel}", get(monitor))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn connect(State(state): State<AppState>) -> ApiResult<Json<OperationResult>> {
    let message = match state.service.connect().await? {
        ConnectOutcome::Connected => "Connected to Model 240",
        ConnectOutcome::AlreadyConnected => "Already connected to Model 240",
    };
    Ok(Json(OperationResult::success(message)))
}

async fn disconnect(State(state): State<AppState>) -> Json<OperationResult> {
    let message = match state.service.disconnect().await {
        DisconnectOutcome::Disconnected => "Disconnected from Model 240",
        DisconnectOutcome::AlreadyDisconnected => "Already disconnected from Model 240",
    };
    Json(OperationResult::success(message))
}

async fn connection(State(state): State<AppState>) -> Json<ConnectionState> {
    Json(ConnectionState {
        connected: state.service.is_connected().await,
    })
}

async fn identification(State(state): State<AppState>) -> ApiResult<Json<Identification>> {
    Ok(Json(state.service.identification().await?))
}

async fn channel_status(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<ChannelStatus>> {
    Ok(Json(state.service.channel_status(channel).await?))
}

async fn module_name(State(state): State<AppState>) -> ApiResult<Json<ModuleName>> {
    let module_name = state.service.module_name().await?;
    Ok(Json(ModuleName { module_name }))
}

async fn set_module_name(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ModuleNameQuery>,
) -> ApiResult<Json<OperationResult>> {
    state.service.set_module_name(query.name).await?;
    Ok(Json(OperationResult::success("Module name updated successfully")))
}

async fn brightness(State(state): State<AppState>) -> ApiResult<Json<BrightnessBody>> {
    let brightness = state.service.brightness().await?;
    Ok(Json(BrightnessBody { brightness }))
}

async fn set_brightness(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BrightnessQuery>,
) -> ApiResult<Json<OperationResult>> {
    state.service.set_brightness(query.brightness).await?;
    Ok(Json(OperationResult::success("Brightness updated successfully")))
}

async fn factory_reset(State(state): State<AppState>) -> ApiResult<Json<OperationResult>> {
    state.service.factory_reset().await?;
    Ok(Json(OperationResult::success("Factory defaults restored")))
}

async fn monitor(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<MonitorReading>> {
    Ok(Json(state.service.monitor(channel).await?))
}

async fn sensor_units(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<f64>> {
    Ok(Json(state.service.sensor_units(channel).await?))
}

async fn input_config(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<InputConfig>> {
    Ok(Json(state.service.input_config(channel).await?))
}

async fn set_input_config(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
    ApiJson(config): ApiJson<InputConfig>,
) -> ApiResult<Json<OperationResult>> {
    state.service.set_input_config(channel, config).await?;
    Ok(Json(OperationResult::success(
        "Input parameters updated successfully",
    )))
}

async fn curve_header(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<CurveHeader>> {
    Ok(Json(state.service.curve_header(channel).await?))
}

async fn set_curve_header(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
    ApiJson(header): ApiJson<CurveHeader>,
) -> ApiResult<Json<OperationResult>> {
    state.service.set_curve_header(channel, header).await?;
    Ok(Json(OperationResult::success("Curve header updated successfully")))
}

async fn curve_data_point(
    State(state): State<AppState>,
    ApiPath((channel, index)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<CurveDataPoint>> {
    Ok(Json(state.service.curve_data_point(channel, index).await?))
}

async fn set_curve_data_point(
    State(state): State<AppState>,
    ApiPath((channel, index)): ApiPath<(i64, i64)>,
    ApiJson(point): ApiJson<CurveDataPoint>,
) -> ApiResult<Json<OperationResult>> {
    state
        .service
        .set_curve_data_point(channel, index, point)
        .await?;
    Ok(Json(OperationResult::success(
        "Curve data point updated successfully",
    )))
}

async fn curve_data_points(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<CurveDataPoints>> {
    Ok(Json(state.service.curve_data_points(channel).await?))
}

async fn delete_curve(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<i64>,
) -> ApiResult<Json<OperationResult>> {
    state.service.delete_curve(channel).await?;
    Ok(Json(OperationResult::success("Curve deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use model240_core::config::DeviceConfig;

    fn app() -> Router {
        let config = DeviceConfig {
            use_mock: true,
            ..DeviceConfig::default()
        };
        let service = model240_devices::service_from_config(&config).unwrap();
        router(AppState::new(service), true)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn connected_app() -> Router {
        let app = app();
        let (status, _) = send(&app, Method::POST, "/device/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    #[tokio::test]
    async fn test_connect_lifecycle() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/device/connection", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"connected": false}));

        let (status, body) = send(&app, Method::GET, "/device/identification", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["is_success"], false);

        let (status, body) = send(&app, Method::POST, "/device/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Connected to Model 240");

        let (status, body) = send(&app, Method::PUT, "/device/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Already connected to Model 240");

        let (_, body) = send(&app, Method::GET, "/device/connection", None).await;
        assert_eq!(body, json!({"connected": true}));

        let (status, _) = send(&app, Method::POST, "/device/disconnect", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::PUT, "/device/disconnect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_success"], true);
    }

    #[tokio::test]
    async fn test_identification_and_monitor() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::GET, "/device/identification", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "manufacturer": "Mock Lakeshore",
                "model": "Model240",
                "serial_number": "12345",
                "firmware_version": "1.0"
            })
        );

        let (status, body) = send(&app, Method::GET, "/3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kelvin"], 298.15);
        assert_eq!(body["celsius"], 25.0);

        let (status, body) = send(&app, Method::GET, "/device/3/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["invalid_reading"], false);
        assert!(body.get("reserved").is_none());
    }

    #[tokio::test]
    async fn test_invalid_channel_is_bad_request() {
        let app = connected_app().await;
        for uri in ["/9", "/0", "/device/-1/status", "/input/12", "/curve/9/header"] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["message"], "Invalid channel");
        }

        let (status, body) = send(&app, Method::GET, "/curve/1/data-point/201", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid curve data point index");
    }

    #[tokio::test]
    async fn test_undecodable_requests_get_operation_result_bodies() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::GET, "/device/abc/status", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["is_success"], false);
        assert_eq!(body["message"], "Invalid request");

        let (status, body) =
            send(&app, Method::PUT, "/device/brightness?brightness=bright", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request");

        let request = Request::builder()
            .method(Method::PUT)
            .uri("/input/1")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["is_success"], false);
        assert!(body["error"].is_string());

        let incomplete = json!({"curve_name": "DT-670"});
        let (status, body) = send(&app, Method::PUT, "/curve/1/header", Some(incomplete)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid request");

        // nothing reached the instrument
        let (_, body) = send(&app, Method::GET, "/curve/1/header", None).await;
        assert_eq!(body["curve_name"], "Curve 1");
    }

    #[tokio::test]
    async fn test_brightness_endpoints() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::GET, "/device/brightness", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"brightness": 50}));

        let (status, _) = send(&app, Method::PUT, "/device/brightness?brightness=150", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::PUT, "/device/brightness?brightness=75", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/device/brightness", None).await;
        assert_eq!(body, json!({"brightness": 75}));
    }

    #[tokio::test]
    async fn test_module_name_endpoints() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::PUT, "/device/module-name?name=Cryostat", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_success"], true);

        let (_, body) = send(&app, Method::GET, "/device/module-name", None).await;
        assert_eq!(body, json!({"module_name": "Cryostat"}));
    }

    #[tokio::test]
    async fn test_input_config_endpoints() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::GET, "/input/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sensor_name"], "Sensor 2");
        assert_eq!(body["sensor_type"], 3);
        assert_eq!(body["filter"], "No filter");

        let update = json!({
            "sensor_name": "Stage",
            "sensor_type": 1,
            "temperature_unit": 2,
            "auto_range_enable": false,
            "current_reversal_enable": true,
            "input_enable": true,
            "input_range": 4
        });
        let (status, _) = send(&app, Method::PUT, "/input/2", Some(update)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/input/2", None).await;
        assert_eq!(body["sensor_name"], "Stage");
        assert_eq!(body["temperature_unit"], 2);
        assert_eq!(body["filter"], "No filter");
    }

    #[tokio::test]
    async fn test_curve_endpoints() {
        let app = connected_app().await;

        let (status, body) = send(&app, Method::GET, "/curve/1/header", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["curve_name"], "Curve 1");
        assert_eq!(body["curve_data_format"], 2);

        let header = json!({
            "curve_name": "DT-670",
            "serial_number": "D6012345",
            "curve_data_format": 2,
            "temperature_limit": 325.0,
            "coefficient": 1
        });
        let (status, _) = send(&app, Method::PUT, "/curve/1/header", Some(header.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/curve/1/header", None).await;
        assert_eq!(body, header);

        let point = json!({"temperature": 77.0, "sensor": 1.5});
        let (status, _) =
            send(&app, Method::PUT, "/curve/1/data-point/10", Some(point.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/curve/1/data-point/10", None).await;
        assert_eq!(body, point);

        let (status, body) = send(&app, Method::GET, "/curve/1/data-points", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channel"], 1);
        assert_eq!(body["temperatures"].as_array().unwrap().len(), 200);
        assert_eq!(body["sensors"].as_array().unwrap().len(), 200);
        assert_eq!(body["sensors"][9], 1.5);
    }

    #[tokio::test]
    async fn test_unsupported_endpoints_are_501() {
        let app = connected_app().await;
        for (method, uri) in [
            (Method::DELETE, "/curve/1"),
            (Method::DELETE, "/device/factory-defaults"),
            (Method::GET, "/sensor-units/1"),
        ] {
            let (status, body) = send(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "{}", uri);
            assert_eq!(body["is_success"], false);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_disconnected_requests_are_503() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/1", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Device not connected");

        let (status, _) = send(&app, Method::PUT, "/device/brightness?brightness=50", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
