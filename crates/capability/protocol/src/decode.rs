//! 多寄存器解码
//!
//! 线上字节按寄存器顺序、每个寄存器高字节在前展开，
//! 再按字节序字母排列还原为逻辑大端字节，最后按数据类型解释。
//!
//! 字节序长度小于数据宽度时按块重复应用（例如 `BA` 作用于 32 位值时
//! 在每个寄存器内交换字节，寄存器顺序不变）。

use crate::error::ProtocolError;
use domain::{ByteOrder, DataType};

/// 按数据类型与字节序解码寄存器序列。
///
/// 定点类型（`FIXED` / `UFIXED`）宽度为寄存器数量（1..=4），返回未缩放的整数值。
pub fn decode(
    registers: &[u16],
    data_type: DataType,
    byte_order: &ByteOrder,
) -> Result<f64, ProtocolError> {
    if registers.is_empty() {
        return Err(ProtocolError::Decode("empty registers".to_string()));
    }
    let count = match data_type.register_count() {
        Some(count) => usize::from(count),
        None => registers.len(),
    };
    if count > 4 {
        return Err(ProtocolError::Decode(format!(
            "{} supports at most 4 registers, got {count}",
            data_type.as_str()
        )));
    }
    if registers.len() < count {
        return Err(ProtocolError::Decode(format!(
            "need {count} registers for {}, got {}",
            data_type.as_str(),
            registers.len()
        )));
    }

    let wire: Vec<u8> = registers[..count]
        .iter()
        .flat_map(|register| register.to_be_bytes())
        .collect();
    let bytes = reorder(&wire, byte_order)?;
    let raw = bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    let bits = bytes.len() as u32 * 8;

    let value = match data_type {
        DataType::Uint16 | DataType::Uint32 | DataType::Uint64 | DataType::Ufixed => raw as f64,
        DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Fixed => {
            sign_extend(raw, bits) as f64
        }
        DataType::Float32 => f64::from(f32::from_bits(raw as u32)),
        DataType::Float64 => f64::from_bits(raw),
    };
    if !value.is_finite() {
        return Err(ProtocolError::Decode(format!(
            "non-finite {} value",
            data_type.as_str()
        )));
    }
    Ok(value)
}

/// 把线上字节还原为逻辑大端字节。
fn reorder(wire: &[u8], byte_order: &ByteOrder) -> Result<Vec<u8>, ProtocolError> {
    let letters = byte_order.letters().as_bytes();
    if letters.is_empty() {
        return Ok(wire.to_vec());
    }
    let width = letters.len();
    if width > wire.len() || wire.len() % width != 0 {
        return Err(ProtocolError::Decode(format!(
            "byte order {} does not fit {} bytes",
            byte_order.letters(),
            wire.len()
        )));
    }
    if byte_order.is_big_endian() {
        return Ok(wire.to_vec());
    }

    let mut logical = vec![0u8; wire.len()];
    for (chunk_index, chunk) in wire.chunks(width).enumerate() {
        let base = chunk_index * width;
        for (position, letter) in letters.iter().enumerate() {
            let target = usize::from(letter - b'A');
            logical[base + target] = chunk[position];
        }
    }
    Ok(logical)
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}
