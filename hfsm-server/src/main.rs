use hfsm_server::grpc::proto::hfsm_server::HfsmServer;
use hfsm_server::grpc::HfsmService;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let addr = "0.0.0.0:50051".parse()?;
    let service = HfsmService::new();

    tracing::info!("hfsm gRPC server listening on {}", addr);

    Server::builder()
        .add_service(HfsmServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
