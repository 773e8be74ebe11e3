use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::reply::Json;
use warp::Filter;

use crate::inventory::{InventoryError, RoomType};
use crate::opd::OpdQueue;
use crate::reservation::{
    PatientInfo, Reservation, ReservationError, ReservationLedger, ReservationStatus,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalBookingRequest {
    pub hospital_id: String,
    pub room_type: RoomType,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_age: Option<u32>,
    pub medical_condition: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitRequest {
    pub bed_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub patient_name: String,
    pub patient_phone: String,
    pub department: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    fn ok(message: &str, data: serde_json::Value) -> Self {
        ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    fn error(message: &str) -> Self {
        ApiResponse {
            status: "error".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

/// User-facing messages for ledger failures. Internal invariant breaches
/// stay generic on the wire; the inventory already logged the details.
fn booking_error(err: &ReservationError) -> ApiResponse {
    match err {
        ReservationError::NoCapacity(_, _) => ApiResponse::error("no beds available"),
        ReservationError::AlreadyExpired(_) => {
            ApiResponse::error("this booking has expired, please book again")
        }
        ReservationError::InvalidState(_, status) => {
            ApiResponse::error(&format!("this booking is already {}", status))
        }
        ReservationError::NotFound(_) => ApiResponse::error("booking not found"),
        ReservationError::BedUnavailable(_) => ApiResponse::error("this bed is not available"),
        ReservationError::Inventory(inner) => match inner {
            InventoryError::UnknownHospital(_) | InventoryError::UnknownRoom(_, _) => {
                ApiResponse::error("unknown hospital or room type")
            }
            _ => ApiResponse::error("something went wrong, please try again"),
        },
    }
}

fn parse_status(value: &str) -> Option<ReservationStatus> {
    match value {
        "provisional" => Some(ReservationStatus::Provisional),
        "confirmed" => Some(ReservationStatus::Confirmed),
        "admitted" => Some(ReservationStatus::Admitted),
        "cancelled" => Some(ReservationStatus::Cancelled),
        "expired" => Some(ReservationStatus::Expired),
        _ => None,
    }
}

fn reservations_json(rows: &[Reservation]) -> serde_json::Value {
    serde_json::to_value(rows).unwrap_or(serde_json::Value::Null)
}

pub struct RestApi {
    ledger: Arc<ReservationLedger>,
    opd: Arc<OpdQueue>,
}

impl RestApi {
    pub fn new(ledger: Arc<ReservationLedger>, opd: Arc<OpdQueue>) -> Self {
        RestApi { ledger, opd }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.post_provisional()
            .or(self.post_confirm())
            .or(self.post_cancel())
            .or(self.post_admit())
            .or(self.get_my_bookings())
            .or(self.get_hospital())
            .or(self.get_hospital_bookings())
            .or(self.get_opd_status())
            .or(self.post_opd_advance())
            .or(self.post_opd_enqueue())
    }

    fn post_provisional(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("bookings" / "provisional")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |request: ProvisionalBookingRequest| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let patient = PatientInfo {
                        name: request.patient_name,
                        phone: request.patient_phone,
                        age: request.patient_age,
                        medical_condition: request.medical_condition,
                    };
                    let response = match ledger.create_provisional(
                        &request.hospital_id,
                        request.room_type,
                        patient,
                        Utc::now(),
                    ) {
                        Ok(reservation) => ApiResponse::ok(
                            "Provisional hold created",
                            serde_json::json!({
                                "reservationId": reservation.id,
                                "expiresAt": reservation.expires_at,
                            }),
                        ),
                        Err(err) => booking_error(&err),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn post_confirm(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("bookings" / Uuid / "confirm")
            .and(warp::post())
            .and_then(move |id: Uuid| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let response = match ledger.confirm(id, Utc::now()) {
                        Ok(reservation) => ApiResponse::ok(
                            "Booking confirmed",
                            serde_json::json!({ "status": reservation.status }),
                        ),
                        Err(err) => booking_error(&err),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn post_cancel(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("bookings" / Uuid / "cancel")
            .and(warp::post())
            .and_then(move |id: Uuid| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let response = match ledger.cancel(id) {
                        Ok(reservation) => ApiResponse::ok(
                            "Booking cancelled",
                            serde_json::json!({ "status": reservation.status }),
                        ),
                        Err(err) => booking_error(&err),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn post_admit(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("bookings" / Uuid / "admit")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |id: Uuid, request: AdmitRequest| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let response = match ledger.admit(id, &request.bed_id) {
                        Ok(reservation) => ApiResponse::ok(
                            "Patient admitted",
                            serde_json::json!({
                                "status": reservation.status,
                                "bedId": reservation.bed_id,
                            }),
                        ),
                        Err(err) => booking_error(&err),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn get_my_bookings(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("bookings" / "my-bookings")
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and_then(move |params: HashMap<String, String>| {
                let ledger = Arc::clone(&ledger);
                async move {
                    // Caller identity arrives from the auth layer as a phone
                    // number query param.
                    let response = match params.get("phone") {
                        Some(phone) => {
                            let rows = ledger.list_by_patient(phone);
                            ApiResponse::ok("Bookings found", reservations_json(&rows))
                        }
                        None => ApiResponse::error("phone query parameter is required"),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn get_hospital(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("hospitals" / String)
            .and(warp::get())
            .and_then(move |hospital_id: String| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let inventory = ledger.inventory();
                    let response = match (
                        inventory.hospital_name(&hospital_id),
                        inventory.availability(&hospital_id),
                    ) {
                        (Ok(name), Ok(rows)) => ApiResponse::ok(
                            "Hospital found",
                            serde_json::json!({
                                "id": hospital_id,
                                "name": name,
                                "bedAvailability": rows,
                            }),
                        ),
                        _ => ApiResponse::error("hospital not found"),
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn get_hospital_bookings(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let ledger = Arc::clone(&self.ledger);

        warp::path!("hospitals" / String / "bookings")
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and_then(move |hospital_id: String, params: HashMap<String, String>| {
                let ledger = Arc::clone(&ledger);
                async move {
                    let response = match params.get("status").map(String::as_str) {
                        Some(raw) => match parse_status(raw) {
                            Some(status) => {
                                let rows = ledger.list_by_hospital(&hospital_id, Some(status));
                                ApiResponse::ok("Bookings found", reservations_json(&rows))
                            }
                            None => ApiResponse::error("unknown status filter"),
                        },
                        None => {
                            let rows = ledger.list_by_hospital(&hospital_id, None);
                            ApiResponse::ok("Bookings found", reservations_json(&rows))
                        }
                    };
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn get_opd_status(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let opd = Arc::clone(&self.opd);

        warp::path!("opd" / "status" / String)
            .and(warp::get())
            .and_then(move |hospital_id: String| {
                let opd = Arc::clone(&opd);
                async move {
                    let queue = opd.status(&hospital_id, Utc::now());
                    let response =
                        ApiResponse::ok("Queue status", serde_json::json!({ "queue": queue }));
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn post_opd_advance(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let opd = Arc::clone(&self.opd);

        warp::path!("opd" / "advance" / String)
            .and(warp::post())
            .and_then(move |hospital_id: String| {
                let opd = Arc::clone(&opd);
                async move {
                    // An empty queue is a quiet no-op, not an error.
                    let advanced = opd.advance(&hospital_id, Utc::now());
                    let response = ApiResponse::ok(
                        "Queue advanced",
                        serde_json::json!({ "advanced": advanced }),
                    );
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }

    fn post_opd_enqueue(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let opd = Arc::clone(&self.opd);

        warp::path!("opd" / "enqueue" / String)
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |hospital_id: String, request: EnqueueRequest| {
                let opd = Arc::clone(&opd);
                async move {
                    let entry = opd.enqueue(
                        &hospital_id,
                        &request.patient_name,
                        &request.patient_phone,
                        &request.department,
                        Utc::now(),
                    );
                    let response = ApiResponse::ok(
                        "Token issued",
                        serde_json::to_value(entry).unwrap_or(serde_json::Value::Null),
                    );
                    Ok::<Json, Infallible>(warp::reply::json(&response))
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::inventory::BedInventory;
    use pretty_assertions::assert_eq;

    fn api() -> RestApi {
        let sink = Arc::new(NullSink);
        let inventory = Arc::new(BedInventory::new(sink.clone()));
        inventory.register_hospital("h1", "City Hospital");
        inventory
            .register_room(
                "h1",
                RoomType::Icu,
                5000,
                &["icu-1".to_string(), "icu-2".to_string()],
            )
            .unwrap();
        let ledger = Arc::new(ReservationLedger::new(
            inventory,
            sink.clone(),
            chrono::Duration::minutes(15),
        ));
        let opd = Arc::new(OpdQueue::new(sink));
        RestApi::new(ledger, opd)
    }

    fn body_json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn provisional_then_confirm_round_trip() {
        let api = api();
        let routes = api.routes();

        let response = warp::test::request()
            .method("POST")
            .path("/bookings/provisional")
            .json(&serde_json::json!({
                "hospitalId": "h1",
                "roomType": "icu",
                "patientName": "Asha Rao",
                "patientPhone": "555-0101",
            }))
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["status"], "success");
        let id = body["data"]["reservationId"].as_str().unwrap().to_string();

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/bookings/{}/confirm", id))
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["data"]["status"], "confirmed");

        let response = warp::test::request()
            .method("GET")
            .path("/bookings/my-bookings?phone=555-0101")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_capacity_reports_no_beds_available() {
        let api = api();
        let routes = api.routes();

        for i in 0..3 {
            let response = warp::test::request()
                .method("POST")
                .path("/bookings/provisional")
                .json(&serde_json::json!({
                    "hospitalId": "h1",
                    "roomType": "icu",
                    "patientName": "Walk In",
                    "patientPhone": format!("555-9{:03}", i),
                }))
                .reply(&routes)
                .await;
            let body = body_json(response.body());
            if i < 2 {
                assert_eq!(body["status"], "success");
            } else {
                assert_eq!(body["status"], "error");
                assert_eq!(body["message"], "no beds available");
            }
        }
    }

    #[tokio::test]
    async fn hospital_snapshot_includes_bed_availability() {
        let api = api();
        let routes = api.routes();

        let response = warp::test::request()
            .method("GET")
            .path("/hospitals/h1")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["data"]["name"], "City Hospital");
        assert_eq!(body["data"]["bedAvailability"][0]["roomType"], "icu");
        assert_eq!(body["data"]["bedAvailability"][0]["available"], 2);

        let response = warp::test::request()
            .method("GET")
            .path("/hospitals/nowhere")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["message"], "hospital not found");
    }

    #[tokio::test]
    async fn opd_enqueue_status_advance_flow() {
        let api = api();
        let routes = api.routes();

        for name in ["Asha Rao", "Vik Shah"] {
            let response = warp::test::request()
                .method("POST")
                .path("/opd/enqueue/h1")
                .json(&serde_json::json!({
                    "patientName": name,
                    "patientPhone": "555-0101",
                    "department": "cardiology",
                }))
                .reply(&routes)
                .await;
            let body = body_json(response.body());
            assert_eq!(body["status"], "success");
        }

        let response = warp::test::request()
            .method("POST")
            .path("/opd/advance/h1")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["data"]["advanced"]["tokenNumber"], 1);

        let response = warp::test::request()
            .method("GET")
            .path("/opd/status/h1")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        let queue = body["data"]["queue"].as_array().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0]["status"], "in_consultation");
    }

    #[tokio::test]
    async fn advance_on_empty_queue_returns_null() {
        let api = api();
        let routes = api.routes();

        let response = warp::test::request()
            .method("POST")
            .path("/opd/advance/h1")
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["status"], "success");
        assert!(body["data"]["advanced"].is_null());
    }

    #[tokio::test]
    async fn unknown_booking_reports_not_found() {
        let api = api();
        let routes = api.routes();

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/bookings/{}/cancel", Uuid::new_v4()))
            .reply(&routes)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "booking not found");
    }
}
