use sl_std::bytestream::ByteStream;

use super::{cosine_transform::ZIGZAG_TO_NATURAL, Error};

const MAX_QUANTIZATION_TABLES: usize = 4;

#[derive(Clone, Debug, Default)]
pub struct QuantizationTables {
    /// Stored in a `Box` to not use too much stack
    tables: Box<[Option<QuantizationTable>; MAX_QUANTIZATION_TABLES]>,
}

#[derive(Clone, Copy, Debug)]
enum Precision {
    U8,
    U16,
}

/// Quantization values in natural (row-major) order
pub type QuantizationTable = [u16; 64];

impl QuantizationTables {
    pub fn get(&self, index: u8) -> Result<&QuantizationTable, Error> {
        self.tables
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::UndefinedQuantizationTable)
    }

    pub fn add_tables(&mut self, tables: &[u8]) -> Result<(), Error> {
        let mut byte_stream = ByteStream::new(tables);

        // There might be multiple quantization tables stored after one another
        while !byte_stream.is_empty() {
            let pq_tq = byte_stream.next_byte().ok_or(Error::BadChunk)?;
            let precision = match pq_tq >> 4 {
                0 => Precision::U8,
                1 => Precision::U16,
                _ => return Err(Error::BadQuantizationTable),
            };

            let destination = pq_tq as usize & 0x0F;
            if self.tables.len() <= destination {
                return Err(Error::BadQuantizationTable);
            }

            // Read 64 elements whose size is specified by "precision", stored in zigzag order
            let mut quantization_table: QuantizationTable = [0; 64];
            for &position in &ZIGZAG_TO_NATURAL {
                quantization_table[position] = match precision {
                    Precision::U8 => byte_stream.next_byte().ok_or(Error::BadChunk)? as u16,
                    Precision::U16 => byte_stream.next_be_u16().ok_or(Error::BadChunk)?,
                };
            }

            if quantization_table.iter().any(|&e| e == 0) {
                return Err(Error::ZeroInQuantizationTable);
            }

            self.tables[destination] = Some(quantization_table);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_stored_in_natural_order() {
        let mut segment = vec![0x01];
        segment.extend(1..=64);

        let mut tables = QuantizationTables::default();
        tables.add_tables(&segment).unwrap();

        let table = tables.get(1).unwrap();
        assert_eq!(table[0], 1);
        assert_eq!(table[1], 2);
        assert_eq!(table[8], 3);
        assert_eq!(table[63], 64);
    }

    #[test]
    fn sixteen_bit_precision() {
        let mut segment = vec![0x10];
        for _ in 0..64 {
            segment.extend_from_slice(&[0x01, 0x00]);
        }

        let mut tables = QuantizationTables::default();
        tables.add_tables(&segment).unwrap();
        assert!(tables.get(0).unwrap().iter().all(|&value| value == 256));
    }

    #[test]
    fn zero_is_rejected() {
        let segment = [0; 65];
        let mut tables = QuantizationTables::default();
        assert_eq!(
            tables.add_tables(&segment),
            Err(Error::ZeroInQuantizationTable)
        );
    }
}
