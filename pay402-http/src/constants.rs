//! HTTP constants for the x402 protocol.

/// Request header carrying the payment payload (client → server).
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Response header carrying the payment requirements on 402 (server → client).
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Response header carrying the settlement result on 2xx (server → client).
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Legacy request header for payment payloads. Accepted on input, never
/// emitted for V2 peers.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";
