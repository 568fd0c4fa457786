//! ED2 turnaround description (ETD) payload.
//!
//! Each record names a turnaround id and up to two sides, ED2 and DE. A
//! side holds a frame rate (coded plus one), for DE a program config, and a
//! list of (presentation, encoder parameters) pairs closed by a zero pair.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::esd::{FrameRate, MAX_DE_PROGRAM_CONFIG};
use crate::model::etd::{Turnaround, TurnaroundPair};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "ETD";

/// Smallest record: id plus two cleared side presence bits.
const MIN_RECORD_BITS: u64 = 10;

const PAIR_BITS: u64 = 17;

fn record_bits(etd: &Turnaround) -> u64 {
    let mut bits = MIN_RECORD_BITS;
    if let Some(ed2) = &etd.ed2 {
        bits += 4 + (ed2.pairs.len() as u64 + 1) * PAIR_BITS;
    }
    if let Some(de) = &etd.de {
        bits += 9 + (de.pairs.len() as u64 + 1) * PAIR_BITS;
    }
    bits
}

fn put_pairs(bs: &mut BsIoVecWriter, pairs: &[TurnaroundPair]) -> std::io::Result<()> {
    for pair in pairs {
        bs.put_n(9, pair.presid)?;
        bs.put_n(8, pair.eepid)?;
    }
    bs.put_n(PAIR_BITS as u32, 0u32)
}

fn read_pairs(bs: &mut BsIoSliceReader<'_>) -> Result<Vec<TurnaroundPair>, KlvError> {
    let mut pairs = Vec::new();
    loop {
        let presid: u16 = bs.get_n(9)?;
        if presid == 0 {
            bs.skip_n(8)?;
            return Ok(pairs);
        }
        let eepid: u8 = bs.get_n(8)?;
        pairs.push(TurnaroundPair { presid, eepid });
    }
}

fn read_rate(bs: &mut BsIoSliceReader<'_>) -> Result<FrameRate, KlvError> {
    read_checked(bs, 4, PAYLOAD, "frame rate", |v| {
        let code = nonzero(v)? as u8;
        FrameRate::from_code(code - 1).ok_or(PayloadStatus::ValueOutOfRange)
    })
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.etd.len();
    if state.etd_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for etd in &model.etd[state.etd_written..] {
        if bs.position() + record_bits(etd) > budget {
            break;
        }
        bs.put_n(8, etd.id)?;
        match &etd.ed2 {
            Some(ed2) => {
                bs.put(true)?;
                bs.put_n(4, ed2.rate as u8 + 1)?;
                put_pairs(&mut bs, &ed2.pairs)?;
            }
            None => bs.put(false)?,
        }
        match &etd.de {
            Some(de) => {
                bs.put(true)?;
                bs.put_n(4, de.rate as u8 + 1)?;
                bs.put_n(5, de.pgm_config)?;
                put_pairs(&mut bs, &de.pairs)?;
            }
            None => bs.put(false)?,
        }
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::Ed2TurnaroundDesc as u8, &bs.finish()?)?;
    state.etd_written += count;
    Ok(if state.etd_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let id: u8 = bs.get_n(8)?;
        let mut etd = Turnaround::new(id);
        if bs.get()? {
            let rate = read_rate(&mut bs)?;
            let pairs = read_pairs(&mut bs)?;
            etd.set_ed2(rate, pairs).map_err(|e| model_err(PAYLOAD, e))?;
        }
        if bs.get()? {
            let rate = read_rate(&mut bs)?;
            let pgm_config = read_checked(&mut bs, 5, PAYLOAD, "DE program config", |v| {
                if v <= MAX_DE_PROGRAM_CONFIG as u64 {
                    Ok(v as u8)
                } else {
                    Err(PayloadStatus::ValueOutOfRange)
                }
            })?;
            let pairs = read_pairs(&mut bs)?;
            etd.set_de(rate, pgm_config, pairs)
                .map_err(|e| model_err(PAYLOAD, e))?;
        }
        model.add_etd(etd).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_round_trip() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        let mut etd = Turnaround::new(6);
        etd.set_ed2(
            FrameRate::Fps2500,
            vec![
                TurnaroundPair { presid: 1, eepid: 2 },
                TurnaroundPair { presid: 3, eepid: 4 },
            ],
        )?;
        etd.set_de(
            FrameRate::Fps5994,
            19,
            vec![TurnaroundPair { presid: 1, eepid: 9 }],
        )?;
        model.add_etd(etd.clone())?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 64];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.etd(6), Some(&etd));
        Ok(())
    }

    #[test]
    fn ed2_side_rejects_high_rates() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        // id 1, b_ed2 set, rate code 6 (50 fps, not an ED2 rate), one pair,
        // terminator, b_de clear.
        let mut bs = BsIoVecWriter::default();
        bs.put_n(8, 1u8)?;
        bs.put(true)?;
        bs.put_n(4, 6u8)?;
        bs.put_n(9, 1u16)?;
        bs.put_n(8, 1u8)?;
        bs.put_n(17, 0u32)?;
        bs.put(false)?;
        let value = bs.finish()?;

        let err = read(&mut model, &value).unwrap_err();
        assert!(matches!(err, KlvError::NoRoom { .. }));
        Ok(())
    }
}
