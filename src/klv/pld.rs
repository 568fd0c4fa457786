//! Presentation loudness description (PLD) payload.
//!
//! Records are presence-bit driven: after the presentation id, a two-bit
//! format version (always zero) and the compliance practice, every
//! measurement is gated by its own bit. The programme boundary distance is
//! unary coded, and the trailing extension carries an explicit bit count
//! with a variable-length escape for counts of 31 and above.

use crate::klv::reader::read_checked;
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::loudness::{
    CorrectionType, DialgatePractice, ExtensionBits, Loudness, LoudnessPractice, LraPractice,
    ProgrammeBoundary,
};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "PLD";

/// Smallest record: id, version, practice and eleven cleared presence bits.
const MIN_RECORD_BITS: u64 = 26;

const LOUDNESS_BITS: u32 = 11;
const VARICHUNK_BITS: u32 = 4;
const EXTENSION_ESCAPE: u64 = 31;

/// Bijective base-16 digits of the escape remainder, least significant
/// first.
fn varichunks(mut n: u64) -> Vec<u8> {
    let mut digits = vec![(n & 0xF) as u8];
    n >>= VARICHUNK_BITS;
    while n > 0 {
        n -= 1;
        digits.push((n & 0xF) as u8);
        n >>= VARICHUNK_BITS;
    }
    digits
}

fn record_bits(l: &Loudness) -> u64 {
    let mut bits = MIN_RECORD_BITS;
    if l.practice != LoudnessPractice::NotIndicated {
        bits += 2 + if l.dialgate.is_some() { 3 } else { 0 };
    }
    let measurements = [
        l.relative_gated,
        l.short_term_3s,
        l.max_short_term_3s,
        l.true_peak,
        l.max_true_peak,
        l.momentary,
        l.max_momentary,
    ];
    bits += measurements.iter().filter(|m| m.is_some()).count() as u64 * LOUDNESS_BITS as u64;
    if l.speech_gated.is_some() {
        bits += LOUDNESS_BITS as u64 + 3;
    }
    if let Some(boundary) = &l.boundary {
        bits += boundary.log2_frames.unsigned_abs() as u64 + 3;
        if boundary.offset.is_some() {
            bits += 11;
        }
    }
    if l.lra.is_some() {
        bits += 13;
    }
    if let Some(ext) = &l.extension {
        bits += 5 + ext.bits as u64;
        if ext.bits as u64 >= EXTENSION_ESCAPE {
            bits += varichunks(ext.bits as u64 - EXTENSION_ESCAPE).len() as u64
                * (VARICHUNK_BITS as u64 + 1);
        }
    }
    bits
}

fn put_opt(bs: &mut BsIoVecWriter, value: Option<u16>) -> std::io::Result<()> {
    match value {
        Some(v) => {
            bs.put(true)?;
            bs.put_n(LOUDNESS_BITS, v)
        }
        None => bs.put(false),
    }
}

fn get_opt(bs: &mut BsIoSliceReader<'_>) -> std::io::Result<Option<u16>> {
    if bs.get()? {
        Ok(Some(bs.get_n(LOUDNESS_BITS)?))
    } else {
        Ok(None)
    }
}

fn write_extension(bs: &mut BsIoVecWriter, ext: &ExtensionBits) -> Result<(), KlvError> {
    if ext.data.len() < ext.bits.div_ceil(8) {
        return Err(KlvError::Field {
            payload: PAYLOAD,
            field: "extension size",
            value: ext.bits as u64,
            status: PayloadStatus::IncorrectStructure,
        });
    }
    if (ext.bits as u64) < EXTENSION_ESCAPE {
        bs.put_n(5, ext.bits as u8)?;
    } else {
        bs.put_n(5, EXTENSION_ESCAPE as u8)?;
        let digits = varichunks(ext.bits as u64 - EXTENSION_ESCAPE);
        let mut digits = digits.iter().rev().peekable();
        while let Some(d) = digits.next() {
            bs.put_n(VARICHUNK_BITS, *d)?;
            bs.put(digits.peek().is_some())?;
        }
    }
    let full = ext.bits / 8;
    let rem = (ext.bits % 8) as u32;
    bs.put_bytes(&ext.data[..full])?;
    if rem > 0 {
        bs.put_n(rem, ext.data[full] >> (8 - rem))?;
    }
    Ok(())
}

fn read_extension(bs: &mut BsIoSliceReader<'_>) -> Result<ExtensionBits, KlvError> {
    let mut bits: u64 = bs.get_n(5)?;
    if bits == EXTENSION_ESCAPE {
        let mut v: u64 = bs.get_n(VARICHUNK_BITS)?;
        while bs.get()? {
            v = ((v + 1) << VARICHUNK_BITS) | bs.get_n::<u64>(VARICHUNK_BITS)?;
        }
        bits = v + EXTENSION_ESCAPE;
    }
    if bits > bs.available()? {
        return Err(KlvError::Field {
            payload: PAYLOAD,
            field: "extension size",
            value: bits,
            status: PayloadStatus::ValueOutOfRange,
        });
    }
    let bits = bits as usize;
    let mut data = vec![0u8; bits.div_ceil(8)];
    let full = bits / 8;
    bs.get_bytes(&mut data[..full])?;
    let rem = (bits % 8) as u32;
    if rem > 0 {
        let tail: u8 = bs.get_n(rem)?;
        data[full] = tail << (8 - rem);
    }
    Ok(ExtensionBits { bits, data })
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.loudness.len();
    if state.loudness_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for l in &model.loudness[state.loudness_written..] {
        if bs.position() + record_bits(l) > budget {
            break;
        }
        bs.put_n(9, l.presid)?;
        bs.put_n(2, 0u8)?;
        bs.put_n(4, l.practice as u8)?;
        if l.practice != LoudnessPractice::NotIndicated {
            match l.dialgate {
                Some(dg) => {
                    bs.put(true)?;
                    bs.put_n(3, dg as u8)?;
                }
                None => bs.put(false)?,
            }
            bs.put(l.correction == CorrectionType::Realtime)?;
        }
        put_opt(&mut bs, l.relative_gated)?;
        match l.speech_gated {
            Some((v, practice)) => {
                bs.put(true)?;
                bs.put_n(LOUDNESS_BITS, v)?;
                bs.put_n(3, practice as u8)?;
            }
            None => bs.put(false)?,
        }
        put_opt(&mut bs, l.short_term_3s)?;
        put_opt(&mut bs, l.max_short_term_3s)?;
        put_opt(&mut bs, l.true_peak)?;
        put_opt(&mut bs, l.max_true_peak)?;
        match &l.boundary {
            Some(boundary) => {
                bs.put(true)?;
                for _ in 0..boundary.log2_frames.unsigned_abs() {
                    bs.put(false)?;
                }
                bs.put(true)?;
                bs.put(boundary.log2_frames > 0)?;
                match boundary.offset {
                    Some(offset) => {
                        bs.put(true)?;
                        bs.put_n(LOUDNESS_BITS, offset)?;
                    }
                    None => bs.put(false)?,
                }
            }
            None => bs.put(false)?,
        }
        match l.lra {
            Some((v, practice)) => {
                bs.put(true)?;
                bs.put_n(10, v)?;
                bs.put_n(3, practice as u8)?;
            }
            None => bs.put(false)?,
        }
        put_opt(&mut bs, l.momentary)?;
        put_opt(&mut bs, l.max_momentary)?;
        match &l.extension {
            Some(ext) => {
                bs.put(true)?;
                write_extension(&mut bs, ext)?;
            }
            None => bs.put(false)?,
        }
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::PresLoudnessDesc as u8, &bs.finish()?)?;
    state.loudness_written += count;
    Ok(if state.loudness_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let presid: u16 = bs.get_n(9)?;
        if presid == 0 {
            break;
        }
        read_checked(&mut bs, 2, PAYLOAD, "version", |v| {
            if v == 0 {
                Ok(())
            } else {
                Err(PayloadStatus::ValueOutOfRange)
            }
        })?;
        let practice = read_checked(&mut bs, 4, PAYLOAD, "loudness practice", |v| {
            LoudnessPractice::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let mut l = Loudness::new(presid, practice);
        if practice != LoudnessPractice::NotIndicated {
            if bs.get()? {
                l.dialgate = Some(read_checked(&mut bs, 3, PAYLOAD, "dialgate practice", |v| {
                    DialgatePractice::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
                })?);
            }
            l.correction = if bs.get()? {
                CorrectionType::Realtime
            } else {
                CorrectionType::FileBased
            };
        }
        l.relative_gated = get_opt(&mut bs)?;
        if bs.get()? {
            let v: u16 = bs.get_n(LOUDNESS_BITS)?;
            let practice = read_checked(&mut bs, 3, PAYLOAD, "speech gate practice", |v| {
                DialgatePractice::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
            })?;
            l.speech_gated = Some((v, practice));
        }
        l.short_term_3s = get_opt(&mut bs)?;
        l.max_short_term_3s = get_opt(&mut bs)?;
        l.true_peak = get_opt(&mut bs)?;
        l.max_true_peak = get_opt(&mut bs)?;
        if bs.get()? {
            let mut magnitude: i8 = 0;
            while !bs.get()? {
                magnitude += 1;
                if magnitude > 9 {
                    return Err(KlvError::Field {
                        payload: PAYLOAD,
                        field: "programme boundary",
                        value: magnitude as u64,
                        status: PayloadStatus::ValueOutOfRange,
                    });
                }
            }
            let log2_frames = if bs.get()? { magnitude } else { -magnitude };
            let offset = if bs.get()? {
                Some(bs.get_n(LOUDNESS_BITS)?)
            } else {
                None
            };
            l.boundary = Some(
                ProgrammeBoundary::new(log2_frames, offset).map_err(|e| model_err(PAYLOAD, e))?,
            );
        }
        if bs.get()? {
            let v: u16 = bs.get_n(10)?;
            let practice = read_checked(&mut bs, 3, PAYLOAD, "loudness range practice", |v| {
                LraPractice::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
            })?;
            l.lra = Some((v, practice));
        }
        l.momentary = get_opt(&mut bs)?;
        l.max_momentary = get_opt(&mut bs)?;
        if bs.get()? {
            l.extension = Some(read_extension(&mut bs)?);
        }
        model.add_loudness(l).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{ObjectMetadata, SpeakerConfig};
    use crate::model::lang::LangCode;
    use crate::utils::codecs;

    fn model_with_presentation() -> anyhow::Result<PmdModel> {
        let mut model = PmdModel::new();
        model.add_object(1, ObjectMetadata::default())?;
        model.add_presentation(1, SpeakerConfig::Stereo, LangCode::new("eng")?, &[1])?;
        Ok(model)
    }

    fn round_trip(l: Loudness) -> anyhow::Result<Loudness> {
        let mut model = model_with_presentation()?;
        model.add_loudness(l)?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 256];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();

        let mut decoded = model_with_presentation()?;
        read(&mut decoded, &buf[2..len])?;
        Ok(decoded.loudness().next().unwrap().clone())
    }

    #[test]
    fn full_record_round_trips() -> anyhow::Result<()> {
        let mut l = Loudness::new(1, LoudnessPractice::Ebu);
        l.dialgate = Some(DialgatePractice::Center);
        l.correction = CorrectionType::Realtime;
        l.relative_gated = Some(codecs::encode_lufs(-23.0)?);
        l.speech_gated = Some((codecs::encode_lufs(-22.1)?, DialgatePractice::Front));
        l.short_term_3s = Some(codecs::encode_lufs(-19.5)?);
        l.max_short_term_3s = Some(codecs::encode_lufs(-15.0)?);
        l.true_peak = Some(codecs::encode_lufs(-1.0)?);
        l.max_true_peak = Some(codecs::encode_lufs(-0.5)?);
        l.boundary = Some(ProgrammeBoundary::new(-4, Some(960))?);
        l.lra = Some((codecs::encode_lra(12.3)?, LraPractice::Tech3342v2));
        l.momentary = Some(codecs::encode_lufs(-20.0)?);
        l.max_momentary = Some(codecs::encode_lufs(-10.0)?);
        assert_eq!(round_trip(l.clone())?, l);
        Ok(())
    }

    #[test]
    fn minimal_record_round_trips() -> anyhow::Result<()> {
        let l = Loudness::new(1, LoudnessPractice::NotIndicated);
        assert_eq!(round_trip(l.clone())?, l);
        Ok(())
    }

    #[test]
    fn short_extension_round_trips() -> anyhow::Result<()> {
        let mut l = Loudness::new(1, LoudnessPractice::Atsc);
        l.extension = Some(ExtensionBits {
            bits: 13,
            data: vec![0xDE, 0xA0],
        });
        assert_eq!(round_trip(l.clone())?, l);
        Ok(())
    }

    #[test]
    fn escaped_extension_round_trips() -> anyhow::Result<()> {
        for bits in [31usize, 46, 300] {
            let mut data = vec![0xA5; bits.div_ceil(8)];
            // Zero the pad bits so equality holds after the trip.
            let rem = bits % 8;
            if rem > 0 {
                let last = data.len() - 1;
                data[last] &= 0xFFu8 << (8 - rem);
            }
            let mut l = Loudness::new(1, LoudnessPractice::Atsc);
            l.extension = Some(ExtensionBits { bits, data });
            assert_eq!(round_trip(l.clone())?, l, "{bits} extension bits");
        }
        Ok(())
    }

    #[test]
    fn oversized_extension_count_is_rejected() -> anyhow::Result<()> {
        let mut bs = BsIoVecWriter::default();
        bs.put_n(9, 1u16)?; // presid
        bs.put_n(2, 0u8)?; // version
        bs.put_n(4, 0u8)?; // practice not indicated
        bs.put_n(10, 0u16)?; // ten cleared presence bits
        bs.put(true)?; // b_extension
        bs.put_n(5, 30u8)?; // claims 30 bits, none follow
        let value = bs.finish()?;

        let mut model = model_with_presentation()?;
        let err = read(&mut model, &value).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueOutOfRange);
        Ok(())
    }
}
