//! Shared PipeWire plumbing for the capture and playback streams

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;

pub(super) const APP_NAME: &str = "Mediabox";

/// Commands sent into a running PipeWire loop
pub(super) enum LoopCommand {
    Stop,
}

/// Main loop, context and core for one stream thread
pub(super) struct Connection {
    pub mainloop: pw::main_loop::MainLoopRc,
    pub core: pw::core::CoreRc,
    _context: pw::context::ContextRc,
}

impl Connection {
    pub fn open() -> Result<Self, String> {
        pw::init();

        let mainloop = pw::main_loop::MainLoopRc::new(None)
            .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

        let context = pw::context::ContextRc::new(&mainloop, None)
            .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

        let core = context
            .connect_rc(None)
            .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

        Ok(Self {
            mainloop,
            core,
            _context: context,
        })
    }
}

/// Serialized EnumFormat pod requesting F32LE, at `rate` when given and at
/// the graph's native rate otherwise
pub(super) fn f32_format_pod(rate: Option<u32>) -> Result<Vec<u8>, String> {
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    if let Some(rate) = rate {
        audio_info.set_rate(rate);
    }

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    Ok(spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner())
}

pub(super) fn as_pod(bytes: &[u8]) -> Result<&Pod, String> {
    Pod::from_bytes(bytes).ok_or_else(|| "Invalid audio format pod".to_string())
}

/// Update `format` when the negotiated stream format is raw audio
pub(super) fn negotiate_format(
    format: &mut spa::param::audio::AudioInfoRaw,
    id: u32,
    param: Option<&Pod>,
) {
    let Some(param) = param else { return };
    if id != spa::param::ParamType::Format.as_raw() {
        return;
    }

    let Ok((media_type, media_subtype)) = format_utils::parse_format(param) else {
        return;
    };
    if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
        return;
    }

    if let Err(e) = format.parse(param) {
        log::warn!("Failed to parse negotiated audio format: {:?}", e);
    }
}
