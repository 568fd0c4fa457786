//! ED2 stream description (ESD) payload.
//!
//! Always exactly three bytes: stream count minus one, this stream's index,
//! the frame rate (coded plus one, zero reserved), and the DE program config
//! and compression of the announced stream. Reading merges into any stream
//! description already being assembled for the same system.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::esd::{Ed2Stream, FrameRate, MAX_DE_PROGRAM_CONFIG, StreamDescription};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "ESD";

const PAYLOAD_BYTES: usize = 3;

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let Some(esd) = &model.esd else {
        return Ok(Written::Yes);
    };
    if state.esd_written {
        return Ok(Written::Yes);
    }
    if state.stream_index >= esd.count {
        return Err(KlvError::Field {
            payload: PAYLOAD,
            field: "stream index",
            value: state.stream_index as u64,
            status: PayloadStatus::ValueOutOfRange,
        });
    }
    if w.value_space() < PAYLOAD_BYTES {
        return Ok(Written::No);
    }

    let stream = esd.streams[state.stream_index as usize];
    let mut bs = BsIoVecWriter::default();
    bs.put_n(4, esd.count - 1)?;
    bs.put_n(4, state.stream_index)?;
    bs.put_n(4, esd.rate as u8 + 1)?;
    bs.put_n(5, stream.config)?;
    bs.put_n(3, stream.compression)?;
    w.commit_local(LocalTag::Ed2SubstreamDesc as u8, &bs.finish()?)?;
    state.esd_written = true;
    Ok(Written::Yes)
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    if value.len() != PAYLOAD_BYTES {
        return Err(KlvError::LengthMismatch {
            payload: PAYLOAD,
            length: value.len(),
            expected: PAYLOAD_BYTES,
        });
    }
    let mut bs = BsIoSliceReader::from_slice(value);
    let count = bs.get_n::<u8>(4)? + 1;
    let index: u8 = bs.get_n(4)?;
    let rate = read_checked(&mut bs, 4, PAYLOAD, "frame rate", |v| {
        let code = nonzero(v)? as u8;
        FrameRate::from_code(code - 1)
            .filter(|r| r.valid_for_ed2())
            .ok_or(PayloadStatus::ValueOutOfRange)
    })?;
    let config = read_checked(&mut bs, 5, PAYLOAD, "DE program config", |v| {
        if v <= MAX_DE_PROGRAM_CONFIG as u64 {
            Ok(v as u8)
        } else {
            Err(PayloadStatus::ValueOutOfRange)
        }
    })?;
    let compression: u8 = bs.get_n(3)?;

    let mut desc = match &model.esd {
        Some(d) if d.count == count && d.rate == rate => d.clone(),
        _ => StreamDescription::new(count, rate).map_err(|e| model_err(PAYLOAD, e))?,
    };
    desc.set_stream(
        index,
        Ed2Stream {
            config,
            compression,
        },
    )
    .map_err(|e| model_err(PAYLOAD, e))?;
    model.set_esd(desc).map_err(|e| model_err(PAYLOAD, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_stream_wire_bytes() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        let mut esd = StreamDescription::new(1, FrameRate::Fps3000)?;
        esd.set_stream(
            0,
            Ed2Stream {
                config: 2,
                compression: 3,
            },
        )?;
        model.set_esd(esd)?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 8];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        assert_eq!(&buf[..len], &[0x0A, 0x03, 0x00, 0x51, 0x30]);

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..5])?;
        let got = decoded.esd().unwrap();
        assert_eq!(got.count, 1);
        assert_eq!(got.rate, FrameRate::Fps3000);
        assert_eq!(got.streams[0].config, 2);
        assert_eq!(got.streams[0].compression, 3);
        assert!(got.complete());
        Ok(())
    }

    #[test]
    fn streams_assemble_across_reads() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        // count-1=1, index=0, rate code 3 (25 fps), config 11, compression 0.
        read(&mut model, &[0x10, 0x35, 0x80])?;
        assert!(!model.esd().unwrap().complete());
        // Same system, index 1, config 19.
        read(&mut model, &[0x11, 0x39, 0x80])?;
        let esd = model.esd().unwrap();
        assert!(esd.complete());
        assert_eq!(esd.streams[0].config, 11);
        assert_eq!(esd.streams[1].config, 19);
        Ok(())
    }

    #[test]
    fn reserved_rate_and_bad_length() {
        let mut model = PmdModel::new();
        let err = read(&mut model, &[0x00, 0x01, 0x30]).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueReserved);
        assert!(matches!(
            read(&mut model, &[0x00, 0x51]),
            Err(KlvError::LengthMismatch { expected: 3, .. })
        ));
    }
}
