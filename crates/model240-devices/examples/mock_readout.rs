use std::sync::Arc;
use std::time::Duration;

use model240_devices::devices::MockFactory;
use model240_devices::{DeviceSession, Model240Service};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Session over the in-memory instrument
    let session = Arc::new(DeviceSession::new(
        Arc::new(MockFactory::new()),
        Duration::from_secs(5),
    ));
    let service = Model240Service::new(session, Duration::from_secs(60));

    service.connect().await?;

    let id = service.identification().await?;
    info!("Connected to {} {} ({})", id.manufacturer, id.model, id.serial_number);

    for channel in 1..=8 {
        let reading = service.monitor(channel).await?;
        let config = service.input_config(channel).await?;
        info!(
            "Channel {} [{}]: {:.2} K, {:.2} sensor units",
            channel,
            config.sensor_name.unwrap_or_default(),
            reading.kelvin,
            reading.sensor
        );
    }

    // Quantized to the nearest front panel level
    service.set_brightness(60).await?;
    info!("Brightness now {}%", service.brightness().await?);

    let curve = service.curve_data_points(1).await?;
    info!(
        "Curve 1 spans {:.1} K to {:.1} K",
        curve.temperatures.first().copied().unwrap_or_default(),
        curve.temperatures.last().copied().unwrap_or_default()
    );

    service.disconnect().await;
    Ok(())
}
