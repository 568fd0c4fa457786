//! KLV local-set codec (SMPTE ST 336 framing, SMPTE ST 2109 tag space).
//!
//! Every payload is framed as a one-byte local tag, a BER length and a
//! bit-packed value, most significant bit first. Values holding several
//! records keep them bit-contiguous and byte-align only at the end of the
//! payload.
//!
//! Writing is space-gated per payload: a record that does not fit in the
//! remaining buffer is held back ([`writer::Written::No`]) and a
//! [`WriteState`] carries the cursors, so one model can be distributed over
//! several successive buffers. Only a buffer too small to frame anything at
//! all is an error.

pub mod abd;
pub mod aod;
pub mod apd;
pub mod apn;
pub mod container;
pub mod eep;
pub mod esd;
pub mod etd;
pub mod hed;
pub mod iat;
pub mod pld;
pub mod xyz;

pub mod reader;
pub mod writer;

use log::{debug, trace};

use crate::model::PmdModel;
use crate::model::element::ElementKind;
use crate::utils::errors::{KlvError, ModelError, PayloadStatus};

pub use writer::Written;

use reader::FrameWalker;
use writer::KlvWriter;

/// Bitstream version this crate writes; readers accept any minor under the
/// same major.
pub const BITSTREAM_VERSION_MAJOR: u8 = 1;
pub const BITSTREAM_VERSION_MINOR: u8 = 0;

/// Local tags of the PMD local set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocalTag {
    Config = 0x01,
    Sync = 0x02,
    Crc = 0x03,
    Version = 0x04,
    AudioBedDesc = 0x05,
    AudioObjectDesc = 0x06,
    AudioPresentationDesc = 0x07,
    AudioPresentationNames = 0x08,
    AudioElementNames = 0x09,
    Ed2SubstreamDesc = 0x0A,
    Ed2SubstreamNames = 0x0B,
    Eac3EncodingParameters = 0x0C,
    DynamicUpdates = 0x0D,
    IdentityTiming = 0x0E,
    PresLoudnessDesc = 0x0F,
    Ed2TurnaroundDesc = 0x10,
    HeadphoneElementDesc = 0x11,
}

impl LocalTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        (0x01..=0x11).contains(&byte).then(|| {
            // Contiguous discriminants, checked above.
            unsafe { std::mem::transmute::<u8, LocalTag>(byte) }
        })
    }
}

/// Cursors tracking how much of a model has been serialized so far, letting
/// one model span several buffers.
#[derive(Debug, Default, Clone)]
pub struct WriteState {
    /// ED2 stream index announced by the ESD payload of this buffer run.
    pub stream_index: u8,
    pub(crate) config_written: bool,
    pub(crate) version_written: bool,
    pub(crate) beds_written: usize,
    pub(crate) objects_written: usize,
    pub(crate) presentations_written: usize,
    pub(crate) names_written: usize,
    pub(crate) esd_written: bool,
    pub(crate) eep_written: usize,
    pub(crate) updates_written: usize,
    pub(crate) iat_written: bool,
    pub(crate) loudness_written: usize,
    pub(crate) etd_written: usize,
    pub(crate) hed_written: usize,
}

impl WriteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_stream(stream_index: u8) -> Self {
        Self {
            stream_index,
            ..Self::default()
        }
    }
}

type WriteStep = fn(&PmdModel, &mut WriteState, &mut KlvWriter) -> Result<Written, KlvError>;

/// Mandatory payloads first, then the rendering set (elements before the
/// presentations that reference them), then the slow-cycle payloads.
const WRITE_STEPS: &[WriteStep] = &[
    container::write_config,
    container::write_version,
    abd::write,
    aod::write,
    apd::write,
    apn::write,
    esd::write,
    eep::write,
    xyz::write,
    iat::write,
    pld::write,
    etd::write,
    hed::write,
];

/// Serialize the whole model into `buf`, returning the encoded length.
///
/// The buffer must hold the complete document; use
/// [`write_payloads_fragment`] to spread a model over several buffers.
pub fn write_payloads(model: &PmdModel, buf: &mut [u8]) -> Result<usize, KlvError> {
    let mut state = WriteState::new();
    let (len, written) = write_payloads_fragment(model, &mut state, buf)?;
    match written {
        Written::Yes => Ok(len),
        Written::No => Err(KlvError::BufferTooSmall),
    }
}

/// Serialize as much of the model as fits, continuing from `state`.
///
/// Returns the bytes written and whether the model is now fully written.
/// A buffer that cannot take a single pending payload while completely
/// empty is a configuration error, not backpressure.
pub fn write_payloads_fragment(
    model: &PmdModel,
    state: &mut WriteState,
    buf: &mut [u8],
) -> Result<(usize, Written), KlvError> {
    let mut w = KlvWriter::new(buf);
    for step in WRITE_STEPS {
        if step(model, state, &mut w)? == Written::No {
            if w.is_empty() {
                return Err(KlvError::BufferTooSmall);
            }
            debug!("buffer full after {} bytes, more payloads pending", w.position());
            return Ok((w.position(), Written::No));
        }
    }
    Ok((w.position(), Written::Yes))
}

/// Parse one KLV buffer into the model.
///
/// Payloads are validated field by field; a payload that fails validation
/// is never partially committed to the model.
pub fn read_payloads(model: &mut PmdModel, buf: &[u8]) -> Result<(), KlvError> {
    let mut walker = FrameWalker::new(buf);
    while let Some(frame) = walker.next_frame()? {
        let Some(tag) = LocalTag::from_byte(frame.tag) else {
            return Err(KlvError::Field {
                payload: "local set",
                field: "local tag",
                value: frame.tag as u64,
                status: PayloadStatus::ValueOutOfRange,
            });
        };
        trace!("payload {:?}, {} bytes", tag, frame.value.len());
        match tag {
            LocalTag::Config => container::read_config(model, frame.value)?,
            LocalTag::Version => container::read_version(model, frame.value)?,
            LocalTag::AudioBedDesc => abd::read(model, frame.value)?,
            LocalTag::AudioObjectDesc => aod::read(model, frame.value)?,
            LocalTag::AudioPresentationDesc => apd::read(model, frame.value)?,
            LocalTag::AudioPresentationNames => apn::read(model, frame.value)?,
            LocalTag::Ed2SubstreamDesc => esd::read(model, frame.value)?,
            LocalTag::Eac3EncodingParameters => eep::read(model, frame.value)?,
            LocalTag::DynamicUpdates => xyz::read(model, frame.value)?,
            LocalTag::IdentityTiming => iat::read(model, frame.value)?,
            LocalTag::PresLoudnessDesc => pld::read(model, frame.value)?,
            LocalTag::Ed2TurnaroundDesc => etd::read(model, frame.value)?,
            LocalTag::HeadphoneElementDesc => hed::read(model, frame.value)?,
            // Transport concerns (sync, CRC) and the text naming layer
            // (AEN, ESN) are skipped, not errors.
            LocalTag::Sync
            | LocalTag::Crc
            | LocalTag::AudioElementNames
            | LocalTag::Ed2SubstreamNames => {}
        }
    }
    Ok(())
}

/// Map a model insertion failure to its KLV classification: unresolved
/// references get their own error, everything else is a no-room condition.
pub(crate) fn model_err(payload: &'static str, source: ModelError) -> KlvError {
    match source {
        ModelError::UnknownId { kind, id } => KlvError::DanglingReference { payload, kind, id },
        source => KlvError::NoRoom { payload, source },
    }
}

/// True when the element at table index `idx` has already been written by
/// the ABD/AOD passes of this write run. Presentations are held back until
/// every element they reference is on the wire.
pub(crate) fn element_written(model: &PmdModel, state: &WriteState, idx: usize) -> bool {
    let is_bed = matches!(model.elements[idx].kind, ElementKind::Bed(_));
    let rank = model.elements[..idx]
        .iter()
        .filter(|e| matches!(e.kind, ElementKind::Bed(_)) == is_bed)
        .count();
    if is_bed {
        rank < state.beds_written
    } else {
        rank < state.objects_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{BedMetadata, BedTrack, ObjectMetadata, Speaker, SpeakerConfig};
    use crate::model::lang::LangCode;

    fn populated_model() -> anyhow::Result<PmdModel> {
        let mut model = PmdModel::new();
        for id in 1..=4 {
            model.add_signal(id)?;
        }
        let mut bed = BedMetadata::new(SpeakerConfig::Stereo);
        bed.add_track(BedTrack::new(Speaker::Left, 1, 0.0)?)?;
        bed.add_track(BedTrack::new(Speaker::Right, 2, 0.0)?)?;
        model.add_bed(1, bed)?;

        let mut obj = ObjectMetadata::default();
        obj.source = 3;
        obj.set_position(0.5, -0.25, 0.0)?;
        obj.dynamic_updates = true;
        model.add_object(2, obj)?;

        model.add_presentation(
            1,
            SpeakerConfig::Stereo,
            LangCode::new("eng")?,
            &[1, 2],
        )?;
        model.set_presentation_name(1, LangCode::new("eng")?, "Main mix")?;
        Ok(model)
    }

    #[test]
    fn model_round_trips() -> anyhow::Result<()> {
        let model = populated_model()?;
        let mut buf = [0u8; 512];
        let len = write_payloads(&model, &mut buf)?;
        assert!(len > 0);

        let mut decoded = PmdModel::new();
        read_payloads(&mut decoded, &buf[..len])?;

        assert_eq!(decoded.version(), Some((1, 0)));
        assert_eq!(decoded.elements().count(), 2);
        let bed = decoded.element(1).unwrap();
        let orig = model.element(1).unwrap();
        assert_eq!(bed.kind, orig.kind);
        let obj = decoded.element(2).unwrap();
        assert_eq!(obj.kind, model.element(2).unwrap().kind);

        let pres = decoded.presentation(1).unwrap();
        assert_eq!(pres.num_elements(), 2);
        assert_eq!(pres.lang, LangCode::new("eng")?);

        let slot = decoded.names().find(1, LangCode::new("eng")?).unwrap();
        assert_eq!(decoded.names().get(slot).unwrap().text, "Main mix");
        Ok(())
    }

    #[test]
    fn tiny_buffer_is_a_hard_error() -> anyhow::Result<()> {
        let model = populated_model()?;
        let mut buf = [0u8; 4];
        assert!(matches!(
            write_payloads(&model, &mut buf),
            Err(KlvError::BufferTooSmall)
        ));
        Ok(())
    }

    #[test]
    fn fragmented_write_spans_buffers() -> anyhow::Result<()> {
        let model = populated_model()?;
        let mut state = WriteState::new();
        let mut decoded = PmdModel::new();
        let mut fragments = 0;

        loop {
            let mut buf = [0u8; 24];
            let (len, written) = write_payloads_fragment(&model, &mut state, &mut buf)?;
            read_payloads(&mut decoded, &buf[..len])?;
            fragments += 1;
            assert!(fragments < 64, "writer failed to make progress");
            if written == Written::Yes {
                break;
            }
        }
        assert!(fragments > 1);
        assert_eq!(decoded.elements().count(), 2);
        assert_eq!(decoded.presentations().count(), 1);
        Ok(())
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut model = PmdModel::new();
        let err = read_payloads(&mut model, &[0x42, 0x01, 0x00]).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueOutOfRange);
    }
}
