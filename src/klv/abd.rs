//! Audio bed description (ABD) payload.
//!
//! One record per bed: 12-bit element id, 5-bit speaker config, an optional
//! origin bed for derived beds, then the track list terminated by 20 zero
//! bits (a zero target speaker plus a blanked source and gain).

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::element::{BedMetadata, BedTrack, ElementKind, Speaker, SpeakerConfig};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "ABD";

/// Smallest record: fixed header plus the terminator.
const MIN_RECORD_BITS: u64 = 38;

const TRACK_BITS: u64 = 20;

fn record_bits(bed: &BedMetadata) -> u64 {
    let origin = if bed.origin.is_some() { 12 } else { 0 };
    18 + origin + (bed.tracks().len() as u64 + 1) * TRACK_BITS
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let beds: Vec<(u16, &BedMetadata)> = model
        .elements
        .iter()
        .filter_map(|e| match &e.kind {
            ElementKind::Bed(bed) => Some((e.id, bed)),
            ElementKind::Object(_) => None,
        })
        .collect();
    if state.beds_written >= beds.len() {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for &(id, bed) in &beds[state.beds_written..] {
        if bs.position() + record_bits(bed) > budget {
            break;
        }
        bs.put_n(12, id)?;
        bs.put_n(5, bed.config as u8)?;
        match bed.origin {
            Some(origin) => {
                bs.put(true)?;
                bs.put_n(12, origin)?;
            }
            None => bs.put(false)?,
        }
        for track in bed.tracks() {
            bs.put_n(6, track.target as u8)?;
            bs.put_n(8, track.source)?;
            bs.put_n(6, track.gain)?;
        }
        bs.put_n(TRACK_BITS as u32, 0u32)?;
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::AudioBedDesc as u8, &bs.finish()?)?;
    state.beds_written += count;
    Ok(if state.beds_written == beds.len() {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let id = read_checked(&mut bs, 12, PAYLOAD, "bed id", nonzero)? as u16;
        let config = read_checked(&mut bs, 5, PAYLOAD, "speaker config", |v| {
            SpeakerConfig::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let mut bed = BedMetadata::new(config);
        if bs.get()? {
            bed.origin = Some(read_checked(&mut bs, 12, PAYLOAD, "origin bed id", nonzero)? as u16);
        }
        let mut tracks = Vec::new();
        loop {
            let target: u8 = bs.get_n(6)?;
            if target == 0 {
                bs.skip_n(14)?;
                break;
            }
            let target = Speaker::from_code(target).ok_or(KlvError::Field {
                payload: PAYLOAD,
                field: "target speaker",
                value: target as u64,
                status: PayloadStatus::ValueReserved,
            })?;
            let source = read_checked(&mut bs, 8, PAYLOAD, "source signal", nonzero)? as u8;
            let gain: u8 = bs.get_n(6)?;
            tracks.push(BedTrack {
                target,
                source,
                gain,
            });
        }
        bed.set_tracks(tracks);
        model.add_bed(id, bed).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::codecs;

    fn stereo_bed() -> anyhow::Result<BedMetadata> {
        let mut bed = BedMetadata::new(SpeakerConfig::Stereo);
        bed.add_track(BedTrack::new(Speaker::Left, 1, 0.0)?)?;
        bed.add_track(BedTrack::new(Speaker::Right, 2, -3.0)?)?;
        Ok(bed)
    }

    fn write_all(model: &PmdModel) -> anyhow::Result<Vec<u8>> {
        let mut state = WriteState::new();
        let mut buf = [0u8; 256];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        Ok(buf[..len].to_vec())
    }

    #[test]
    fn bed_round_trips_with_gains() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.add_bed(9, stereo_bed()?)?;
        let framed = write_all(&model)?;
        assert_eq!(framed[0], LocalTag::AudioBedDesc as u8);

        let mut decoded = PmdModel::new();
        read(&mut decoded, &framed[2..])?;
        let bed = decoded.element(9).unwrap();
        assert_eq!(bed.kind, model.element(9).unwrap().kind);
        let ElementKind::Bed(md) = &bed.kind else {
            unreachable!()
        };
        assert_eq!(md.tracks()[1].gain, codecs::encode_gain(-3.0)?);
        Ok(())
    }

    #[test]
    fn derived_bed_carries_origin() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.add_bed(1, stereo_bed()?)?;
        let mut derived = stereo_bed()?;
        derived.origin = Some(1);
        model.add_bed(2, derived)?;

        let framed = write_all(&model)?;
        let mut decoded = PmdModel::new();
        read(&mut decoded, &framed[2..])?;
        let ElementKind::Bed(md) = &decoded.element(2).unwrap().kind else {
            unreachable!()
        };
        assert_eq!(md.origin, Some(1));
        Ok(())
    }

    #[test]
    fn reserved_speaker_config_is_rejected() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.add_bed(1, stereo_bed()?)?;
        let mut framed = write_all(&model)?;
        // Force the 5-bit config field (bits 12..17 of the value) to 31.
        framed[3] |= 0x0F;
        framed[4] |= 0x80;

        let mut decoded = PmdModel::new();
        let err = read(&mut decoded, &framed[2..]).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueReserved);
        assert_eq!(decoded.elements().count(), 0);
        Ok(())
    }
}
