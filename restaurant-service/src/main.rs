use service_common::{Service, ServiceKind};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    Service::new(ServiceKind::Restaurant).run().await?;

    Ok(())
}
