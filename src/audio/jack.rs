use anyhow::{Context, Result, anyhow, bail};
use jack::{AsyncClient, AudioOut, Client, ClientOptions, Control, Port, ProcessScope};
use log::{debug, error, info, warn};

use crate::audio::sink::{PlaybackSink, SampleBuffer, SinkProvider, StreamFormat};

const OUT_PORT: &str = "out_port";

pub struct NotificationHandler;

impl jack::NotificationHandler for NotificationHandler {
    fn sample_rate(&mut self, _: &Client, sample_rate: jack::Frames) -> Control {
        debug!(">> JACK sample_rate changed to {sample_rate}");

        Control::Continue
    }
}

/// Realtime callback that renders the sample buffer to the output port.
pub struct ProcessHandler {
    output: Port<AudioOut>,
    buffer: SampleBuffer,
}

impl jack::ProcessHandler for ProcessHandler {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        self.buffer.drain_into(self.output.as_mut_slice(ps));
        Control::Continue
    }

    fn buffer_size(&mut self, _: &Client, frames: jack::Frames) -> Control {
        debug!(">> JACK buffer_size changed to {frames} frames");
        Control::Continue
    }
}

/// Opens a JACK client per engine start.
#[derive(Debug, Clone)]
pub struct JackSinkProvider {
    client_name: String,
    playback_ports: Vec<String>,
}

impl JackSinkProvider {
    pub fn new(client_name: impl Into<String>, playback_ports: Vec<String>) -> Self {
        Self {
            client_name: client_name.into(),
            playback_ports,
        }
    }
}

impl SinkProvider for JackSinkProvider {
    fn acquire(&self) -> Result<Box<dyn PlaybackSink>> {
        let (client, _status) = Client::new(&self.client_name, ClientOptions::NO_START_SERVER)
            .context("failed to create JACK client")?;

        debug!(
            "JACK client '{}' opened: {} Hz, {} frames per period",
            client.name(),
            client.sample_rate(),
            client.buffer_size()
        );

        Ok(Box::new(JackSink {
            client: Some(client),
            handler: None,
            active: None,
            playback_ports: self.playback_ports.clone(),
        }))
    }
}

/// Mono JACK output fed from a [`SampleBuffer`].
pub struct JackSink {
    client: Option<Client>,
    handler: Option<ProcessHandler>,
    active: Option<AsyncClient<NotificationHandler, ProcessHandler>>,
    playback_ports: Vec<String>,
}

impl JackSink {
    fn connect_ports(&self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let client = active.as_client();
        let source = format!("{}:{OUT_PORT}", client.name());

        for destination in &self.playback_ports {
            if let Err(e) = client.connect_ports_by_name(&source, destination) {
                warn!("Failed to connect output port '{destination}': {e}");
            } else {
                info!("Connected output: {source} -> {destination}");
            }
        }
    }
}

impl PlaybackSink for JackSink {
    fn init(&mut self, format: StreamFormat, buffer: SampleBuffer) -> Result<()> {
        if format.channels != 1 {
            bail!("JACK sink only renders mono, got {} channels", format.channels);
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("JACK sink already released"))?;

        let server_rate = client.sample_rate();
        if server_rate != format.sample_rate {
            warn!(
                "JACK runs at {server_rate} Hz but the engine renders {} Hz; playback will be pitch shifted",
                format.sample_rate
            );
        }

        let output = client
            .register_port(OUT_PORT, AudioOut::default())
            .context("failed to register out port")?;

        debug!(
            "JACK sink initialised with a {} sample buffer",
            buffer.capacity()
        );
        self.handler = Some(ProcessHandler { output, buffer });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        let client = self
            .client
            .take()
            .ok_or_else(|| anyhow!("JACK sink already released"))?;
        let handler = self
            .handler
            .take()
            .ok_or_else(|| anyhow!("JACK sink played before init"))?;

        let active = client
            .activate_async(NotificationHandler, handler)
            .context("failed to activate async client")?;
        self.active = Some(active);

        self.connect_ports();
        Ok(())
    }

    fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        match active.deactivate() {
            Ok((client, _, handler)) => {
                handler.buffer.clear();
                self.client = Some(client);
                self.handler = Some(handler);
                debug!("JACK client deactivated");
            }
            Err(e) => error!("Failed to deactivate JACK client: {e}"),
        }
    }

    fn release(&mut self) {
        self.stop();
        self.handler = None;
        if self.client.take().is_some() {
            debug!("JACK client released");
        }
    }
}
