//! 寄存器数据类型与字节序

/// 寄存器序列的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Uint16,
    Uint32,
    Uint64,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// 有符号定点数，宽度由地址数量决定
    Fixed,
    /// 无符号定点数，宽度由地址数量决定
    Ufixed,
}

impl DataType {
    /// 解析配置中的类型名（兼容 `FLOAT32-IEEE` / `FLOAT64-IEEE` / `DOUBLE` 别名）。
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        let data_type = match normalized.as_str() {
            "UINT16" => Self::Uint16,
            "UINT32" => Self::Uint32,
            "UINT64" => Self::Uint64,
            "INT16" => Self::Int16,
            "INT32" => Self::Int32,
            "INT64" => Self::Int64,
            "FLOAT32" | "FLOAT32-IEEE" => Self::Float32,
            "FLOAT64" | "FLOAT64-IEEE" | "DOUBLE" => Self::Float64,
            "FIXED" => Self::Fixed,
            "UFIXED" => Self::Ufixed,
            _ => return None,
        };
        Some(data_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Uint64 => "UINT64",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Fixed => "FIXED",
            Self::Ufixed => "UFIXED",
        }
    }

    /// 固定宽度类型需要的寄存器数量；定点类型返回 `None`。
    pub fn register_count(&self) -> Option<u16> {
        match self {
            Self::Uint16 | Self::Int16 => Some(1),
            Self::Uint32 | Self::Int32 | Self::Float32 => Some(2),
            Self::Uint64 | Self::Int64 | Self::Float64 => Some(4),
            Self::Fixed | Self::Ufixed => None,
        }
    }
}

/// 字节序：字母排列描述线上字节位置。
///
/// `A` 为逻辑最高位字节；第 i 个字母表示线上第 i 个字节对应的逻辑字节。
/// 例如 `ABCD` 为大端，`DCBA` 为小端，`CDAB` 为字交换。
/// 空字节序等价于大端。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteOrder {
    letters: String,
}

impl ByteOrder {
    /// 解析字节序，非法排列返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        let letters = value.trim().to_ascii_uppercase();
        if letters.len() > 8 {
            return None;
        }
        let mut seen = [false; 8];
        for byte in letters.bytes() {
            let index = byte.checked_sub(b'A')? as usize;
            if index >= letters.len() || seen[index] {
                return None;
            }
            seen[index] = true;
        }
        Some(Self { letters })
    }

    pub fn big_endian() -> Self {
        Self::default()
    }

    pub fn letters(&self) -> &str {
        &self.letters
    }

    pub fn is_big_endian(&self) -> bool {
        self.letters
            .bytes()
            .enumerate()
            .all(|(index, byte)| usize::from(byte - b'A') == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_aliases() {
        assert_eq!(DataType::parse("float32-ieee"), Some(DataType::Float32));
        assert_eq!(DataType::parse("DOUBLE"), Some(DataType::Float64));
        assert_eq!(DataType::parse("UFIXED"), Some(DataType::Ufixed));
        assert_eq!(DataType::parse("FLOAT16"), None);
    }

    #[test]
    fn byte_order_rejects_non_permutation() {
        assert!(ByteOrder::parse("CDAB").is_some());
        assert!(ByteOrder::parse("GHEFCDAB").is_some());
        assert!(ByteOrder::parse("AAB").is_none());
        assert!(ByteOrder::parse("ABE").is_none());
        assert!(ByteOrder::parse("ABCD").map(|o| o.is_big_endian()).unwrap_or(false));
        assert!(ByteOrder::parse("").map(|o| o.is_big_endian()).unwrap_or(false));
    }
}
