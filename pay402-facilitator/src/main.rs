//! Binary entrypoint for the x402 facilitator service.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pay402_facilitator::run().await
}
