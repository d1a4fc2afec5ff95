use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::{checkout, email, invoices, shipments, tracking, webhook};
use crate::domain::order::{CartItem, PostalAddress};

#[derive(OpenApi)]
#[openapi(
    info(title = "Loadify Market API"),
    paths(
        checkout::create_checkout,
        webhook::stripe_webhook,
        shipments::create_shipment,
        shipments::update_shipment_status,
        shipments::request_proof_upload,
        shipments::confirm_proof_upload,
        tracking::track_shipment,
        invoices::generate_invoice,
        email::send_email,
    ),
    components(schemas(
        CartItem,
        PostalAddress,
        checkout::CreateCheckoutRequest,
        checkout::CreateCheckoutResponse,
        checkout::CheckoutTotalsResponse,
        shipments::CreateShipmentRequest,
        shipments::UpdateShipmentStatusRequest,
        shipments::ProofUploadRequest,
        shipments::ProofConfirmRequest,
        shipments::ProofUploadResponse,
        shipments::ShipmentResponse,
        shipments::ShipmentEventResponse,
        tracking::TrackShipmentResponse,
        tracking::TrackedOrder,
        tracking::TrackedItem,
        invoices::GenerateInvoiceRequest,
        invoices::GenerateInvoiceResponse,
        email::SendEmailRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "checkout", description = "Hosted payment sessions"),
        (name = "payments", description = "Payment provider callbacks"),
        (name = "shipments", description = "Seller and admin fulfilment"),
        (name = "tracking", description = "Public order lookup"),
        (name = "internal", description = "Invoice and email workers"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
