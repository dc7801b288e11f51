use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::command::{classify_ack, temperature_syn, AckOutcome, PROGRAM_SYN};
use crate::legacy::parse_legacy;
use crate::logger::{TrafficLogMode, TrafficLogger};
use crate::merge;
use crate::status::parse_status;
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

const STATUS_PATH: &str = "/status.cgi";
const DAQ_DESC_PATH: &str = "/daqdesc.cgi";
const DAQ_DATA_PATH: &str = "/daqdata.cgi";
const EXT_PARSET_PATH: &str = "/ext/parset.cgi";
const PARSET_PATH: &str = "/parset.cgi";

/// The legacy endpoints answer in a Western European single-byte encoding
/// without declaring it.
const LEGACY_CHARSET: &str = "windows-1252";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_LEGACY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BiostarClientBuilder {
    host: String,
    protocol: String,
    api_key: String,
    write_key: Option<String>,
    request_timeout: Duration,
    log_mode: Option<TrafficLogMode>,
    log_path: Option<String>,
}

impl BiostarClientBuilder {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: "http".to_string(),
            api_key: api_key.into(),
            write_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    /// Secondary secret gating all write operations. Without it every
    /// write fails fast, before any network call.
    pub fn write_key(mut self, key: impl Into<String>) -> Self {
        self.write_key = Some(key.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn traffic_log(mut self, mode: TrafficLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> BiostarClient {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => {
                Some(TrafficLogger::new(mode, &path).expect("failed to open log file"))
            }
            _ => None,
        };

        BiostarClient {
            transport: Transport::new(&self.protocol, &self.host),
            api_key: self.api_key,
            write_key: self.write_key,
            request_timeout: self.request_timeout,
            logger: logger.map(Mutex::new),
        }
    }
}

/// One full refresh: the unified snapshot plus whatever device-level
/// extras the status endpoint carried this cycle. `None` extras mean the
/// endpoint omitted them, not that they were cleared.
#[derive(Debug, Clone, Default)]
pub struct RefreshData {
    pub snapshot: SensorSnapshot,
    pub device_meta: Option<DeviceMeta>,
    pub heating_circuits: Option<Vec<HeatingCircuit>>,
    pub heat_constraints: Option<TemperatureConstraints>,
}

pub struct BiostarClient {
    transport: Transport,
    api_key: String,
    write_key: Option<String>,
    request_timeout: Duration,
    logger: Option<Mutex<TrafficLogger>>,
}

impl BiostarClient {
    pub fn builder(host: impl Into<String>, api_key: impl Into<String>) -> BiostarClientBuilder {
        BiostarClientBuilder::new(host, api_key)
    }

    pub fn has_write_access(&self) -> bool {
        self.write_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Check which API generation the device speaks. Tries the modern
    /// status endpoint first, then the legacy description endpoint.
    pub async fn probe(&self) -> Result<ApiGeneration> {
        match self
            .transport
            .get(STATUS_PATH, &[("key", &self.api_key)], PROBE_STATUS_TIMEOUT)
            .await
        {
            Ok(resp) if resp.status().as_u16() == 200 => {
                if resp.json::<Value>().await.is_ok() {
                    return Ok(ApiGeneration::Modern);
                }
                debug!("status endpoint did not return valid JSON");
            }
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "status endpoint not available")
            }
            Err(err) => debug!(error = %err, "status endpoint not reachable"),
        }

        let resp = self
            .transport
            .get(DAQ_DESC_PATH, &[("key", &self.api_key)], PROBE_LEGACY_TIMEOUT)
            .await?;
        match resp.status().as_u16() {
            200 => Ok(ApiGeneration::Legacy),
            status => Err(Error::FetchFailed {
                endpoint: DAQ_DESC_PATH,
                status,
            }),
        }
    }

    /// One full refresh cycle across both API generations.
    pub async fn refresh_data(&self) -> Result<RefreshData> {
        let mut data = RefreshData::default();

        let status_snapshot = match self.fetch_status().await {
            Some(raw) => {
                let parsed = parse_status(&raw);
                data.device_meta = parsed.meta;
                data.heating_circuits = parsed.circuits;
                data.heat_constraints = parsed.constraints;
                Some(parsed.snapshot)
            }
            None => None,
        };

        data.snapshot = merge::combine(status_snapshot, self.fetch_legacy().await)?;
        info!(sensors = data.snapshot.len(), "refresh complete");
        self.log_refresh(&data.snapshot);
        Ok(data)
    }

    /// Fetch and decode the modern status endpoint. Soft negotiation:
    /// an unreachable or non-JSON endpoint yields `None`, never an
    /// error.
    async fn fetch_status(&self) -> Option<Value> {
        self.log_request(STATUS_PATH);
        match self
            .transport
            .get(STATUS_PATH, &[("key", &self.api_key)], self.request_timeout)
            .await
        {
            Ok(resp) if resp.status().as_u16() == 200 => match resp.json::<Value>().await {
                Ok(data) => {
                    debug!("retrieved status endpoint data");
                    Some(data)
                }
                Err(err) => {
                    debug!(error = %err, "status endpoint returned invalid JSON");
                    None
                }
            },
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "status endpoint returned error");
                None
            }
            Err(err) => {
                debug!(error = %err, "status endpoint not available");
                None
            }
        }
    }

    /// Fetch and parse the paired legacy endpoints. Unlike the status
    /// endpoint these are load-bearing: failures propagate.
    async fn fetch_legacy(&self) -> Result<SensorSnapshot> {
        let descriptions = self.fetch_legacy_text(DAQ_DESC_PATH).await?;
        let values = self.fetch_legacy_text(DAQ_DATA_PATH).await?;
        Ok(parse_legacy(&descriptions, &values))
    }

    async fn fetch_legacy_text(&self, path: &'static str) -> Result<String> {
        self.log_request(path);
        let resp = self
            .transport
            .get(path, &[("key", &self.api_key)], self.request_timeout)
            .await?;
        let status = resp.status().as_u16();
        if status != 200 {
            warn!(endpoint = path, status, "legacy endpoint returned error");
            return Err(Error::FetchFailed {
                endpoint: path,
                status,
            });
        }
        Ok(resp.text_with_charset(LEGACY_CHARSET).await?)
    }

    /// Select the heating program. Requires the write key.
    pub async fn set_program(&self, program: Program) -> Result<()> {
        self.dispatch_write(PROGRAM_SYN.to_string(), program.code().to_string(), true)
            .await
    }

    /// Set the day or night set-point of a heating circuit. Requires the
    /// write key. No legacy fallback: only the extended endpoint
    /// understands set-point parameters.
    pub async fn set_temperature(
        &self,
        circuit_nr: u32,
        temp_type: TempType,
        value: f64,
    ) -> Result<()> {
        self.dispatch_write(temperature_syn(circuit_nr, temp_type), value.to_string(), false)
            .await
    }

    /// Run the write-attempt chain: extended endpoint, then (for program
    /// writes) the legacy endpoint. Stops at the first ack or explicit
    /// rejection; transport failures only end the current attempt.
    async fn dispatch_write(&self, syn: String, value: String, legacy_fallback: bool) -> Result<()> {
        let Some(write_key) = self.write_key.as_deref().filter(|k| !k.is_empty()) else {
            warn!(syn = %syn, "write command refused: no write key configured");
            return Err(Error::WriteDenied);
        };

        self.log_write(&syn, &value);
        let params = [
            ("syn", syn.as_str()),
            ("value", value.as_str()),
            ("key", write_key),
        ];

        match self.try_extended_write(&params).await {
            AckOutcome::Acked => {
                info!(syn = %syn, value = %value, "parameter set via extended endpoint");
                return Ok(());
            }
            AckOutcome::Rejected(reason) => {
                warn!(syn = %syn, reason = %reason, "device rejected parameter write");
                return Err(Error::WriteRejected(reason));
            }
            AckOutcome::Inconclusive => {}
        }

        if legacy_fallback && self.try_legacy_write(&params).await {
            info!(syn = %syn, value = %value, "parameter set via legacy endpoint");
            return Ok(());
        }

        Err(Error::WriteFailed)
    }

    async fn try_extended_write(&self, params: &[(&str, &str)]) -> AckOutcome {
        match self
            .transport
            .get(EXT_PARSET_PATH, params, self.request_timeout)
            .await
        {
            Ok(resp) if resp.status().as_u16() == 200 => match resp.text().await {
                Ok(body) => classify_ack(&body),
                Err(err) => {
                    debug!(error = %err, "failed to read extended endpoint response");
                    AckOutcome::Inconclusive
                }
            },
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "extended endpoint returned error");
                AckOutcome::Inconclusive
            }
            Err(err) => {
                debug!(error = %err, "extended endpoint not available");
                AckOutcome::Inconclusive
            }
        }
    }

    async fn try_legacy_write(&self, params: &[(&str, &str)]) -> bool {
        match self
            .transport
            .get(PARSET_PATH, params, self.request_timeout)
            .await
        {
            Ok(resp) if resp.status().as_u16() == 200 => true,
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "legacy write endpoint returned error");
                false
            }
            Err(err) => {
                warn!(error = %err, "legacy write endpoint failed");
                false
            }
        }
    }

    fn log_request(&self, path: &str) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_request(path);
        }
    }

    fn log_write(&self, syn: &str, value: &str) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_write(syn, value);
        }
    }

    fn log_refresh(&self, snapshot: &SensorSnapshot) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_refresh(snapshot);
        }
    }
}
