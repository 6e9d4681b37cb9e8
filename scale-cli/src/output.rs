//! JSON result lines
//!
//! Field names follow the conventions of the scrap plant backend that
//! consumes this output (`peso`, `puerto`, `configuracion`, ...).

use std::io::Write;

use scale_detect::{OneShotRead, PortDescriptor, SerialConfig};
use scale_protocol::{DecodeResult, ReadMethod, WeightFormat, WeightReading};
use scale_session::{ConnectOutcome, PollEvent, SessionError};
use serde::Serialize;

const NO_WEIGHT_MESSAGE: &str = "Sin datos de peso";
const NO_VALID_WEIGHT: &str = "No se detectó peso válido";
const CLOSED_MESSAGE: &str = "Conexión cerrada";

/// One result line written to stdout
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ports(Vec<PortDescriptor>),
    Connected(Connected),
    Weight(Weight),
    Closed(Closed),
    Failed(Failure),
}

#[derive(Debug, Serialize)]
pub struct Connected {
    success: bool,
    peso: f64,
    puerto: String,
    configuracion: SerialConfig,
    #[serde(rename = "tieneWeightInicial")]
    tiene_weight_inicial: bool,
}

#[derive(Debug, Serialize)]
pub struct Weight {
    success: bool,
    peso: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formato_detectado: Option<WeightFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metodo: Option<ReadMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mensaje: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuracion: Option<SerialConfig>,
}

#[derive(Debug, Serialize)]
pub struct Closed {
    success: bool,
    mensaje: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Failure {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    puerto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requiere_conexion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuracion: Option<SerialConfig>,
}

impl Response {
    pub fn connected(outcome: &ConnectOutcome) -> Self {
        Response::Connected(Connected {
            success: true,
            peso: outcome.kilograms(),
            puerto: outcome.port.clone(),
            configuracion: outcome.config,
            tiene_weight_inicial: outcome.has_initial_weight(),
        })
    }

    /// A read cycle; a miss is still a successful read of 0.0
    pub fn reading(result: &DecodeResult) -> Self {
        Response::Weight(weight_of(result))
    }

    /// One continuous-read cycle, in the same shape as a single read
    pub fn poll_event(event: &PollEvent) -> Self {
        match event {
            PollEvent::Reading(reading) => Response::Weight(found(reading)),
            PollEvent::NoData { last_frame } => Response::Weight(missing(last_frame)),
            PollEvent::Failed(e) => Response::failure(e, None),
        }
    }

    /// A one-shot read, which fails when no weight decoded
    pub fn one_shot(shot: &OneShotRead) -> Self {
        match &shot.result {
            DecodeResult::Weight(_) => Response::Weight(Weight {
                configuracion: Some(shot.config),
                ..weight_of(&shot.result)
            }),
            DecodeResult::NoWeight { last_frame } => Response::Failed(Failure {
                success: false,
                error: NO_VALID_WEIGHT.to_string(),
                puerto: None,
                requiere_conexion: None,
                raw_data: last_frame.clone(),
                configuracion: Some(shot.config),
            }),
        }
    }

    pub fn closed() -> Self {
        Response::Closed(Closed {
            success: true,
            mensaje: CLOSED_MESSAGE,
        })
    }

    /// A failed operation, flagged when the caller must connect again
    pub fn failure(err: &SessionError, port: Option<&str>) -> Self {
        Response::Failed(Failure {
            success: false,
            error: err.to_string(),
            puerto: port.map(str::to_string),
            requiere_conexion: err.requires_reconnect().then_some(true),
            raw_data: None,
            configuracion: None,
        })
    }

    /// Write as one JSON line
    pub fn emit(&self) -> anyhow::Result<()> {
        let line = serde_json::to_string(self)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

fn weight_of(result: &DecodeResult) -> Weight {
    match result {
        DecodeResult::Weight(reading) => found(reading),
        DecodeResult::NoWeight { last_frame } => missing(last_frame),
    }
}

fn found(reading: &WeightReading) -> Weight {
    Weight {
        success: true,
        peso: reading.kilograms,
        raw_data: reading.raw_frame.clone(),
        formato_detectado: Some(reading.format),
        metodo: Some(reading.method),
        mensaje: None,
        configuracion: None,
    }
}

fn missing(last_frame: &Option<String>) -> Weight {
    Weight {
        success: true,
        peso: 0.0,
        raw_data: last_frame.clone(),
        formato_detectado: None,
        metodo: None,
        mensaje: Some(NO_WEIGHT_MESSAGE),
        configuracion: None,
    }
}
