use super::{bit_reader::BitReader, Error};

/// DC and AC tables may each use destinations `0..4`
const MAX_NUM_HUFFMAN_TABLES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableClass {
    DC,
    AC,
}

#[derive(Clone, Default)]
pub struct HuffmanTables {
    tables: [Option<HuffmanTable>; MAX_NUM_HUFFMAN_TABLES],
}

/// A huffman table for decoding symbols
///
/// Every possible 16 bit prefix of the input maps directly to the symbol whose code it starts with.
/// Implemented as in <https://commandlinefanatic.com/cgi-bin/showarticle.cgi?article=art007>
#[derive(Clone, Debug)]
pub struct HuffmanTable {
    lookup_table: Box<[HuffmanTableEntry]>,
}

#[derive(Clone, Copy, Debug, Default)]
struct HuffmanTableEntry {
    /// Length of the code in bits, zero if no code starts with this prefix
    length: u8,

    /// The decoded symbol
    symbol: u8,
}

impl HuffmanTable {
    fn insert_symbol(&mut self, code: u16, length: u8, symbol: u8) {
        let unused_bits = 16 - length as u32;
        let base = (code as usize) << unused_bits;
        let entry = HuffmanTableEntry { length, symbol };

        self.lookup_table[base..base + (1 << unused_bits)].fill(entry);
    }

    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8, Error> {
        let entry = self.lookup_table[reader.peek_u16() as usize];

        if entry.length == 0 {
            log::error!("Invalid huffman code in entropy coded data");
            return Err(Error::BadHuffmanCode);
        }

        reader.advance(entry.length as usize)?;
        Ok(entry.symbol)
    }

    fn from_counts_and_symbols(counts: &[u8; 16], symbols: &[u8]) -> Result<Self, Error> {
        let mut table = Self::default();
        let mut symbols = symbols.iter();

        let mut code: u32 = 0;
        for (code_length, &count) in (1..=16).zip(counts) {
            for _ in 0..count {
                // The codes of a given length must fit in that many bits
                if code >= 1 << code_length {
                    log::error!("Huffman table is over-subscribed");
                    return Err(Error::BadHuffmanTable);
                }

                let symbol = *symbols.next().ok_or(Error::BadHuffmanTable)?;
                table.insert_symbol(code as u16, code_length, symbol);
                code += 1;
            }
            code <<= 1;
        }

        Ok(table)
    }
}

impl Default for HuffmanTable {
    fn default() -> Self {
        Self {
            lookup_table: vec![HuffmanTableEntry::default(); 1 << 16].into_boxed_slice(),
        }
    }
}

impl HuffmanTables {
    #[must_use]
    fn index(class: TableClass, destination: u8) -> usize {
        match class {
            TableClass::DC => destination as usize,
            TableClass::AC => 4 + destination as usize,
        }
    }

    pub fn get(&self, class: TableClass, destination: u8) -> Result<&HuffmanTable, Error> {
        self.tables
            .get(Self::index(class, destination))
            .and_then(Option::as_ref)
            .ok_or(Error::UndefinedHuffmanTable)
    }

    /// Parse the contents of a `DHT` segment, which may define any number of tables
    pub fn add_tables(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while let Some((&tc_th, rest)) = bytes.split_first() {
            let class = match tc_th >> 4 {
                0 => TableClass::DC,
                1 => TableClass::AC,
                _ => return Err(Error::BadHuffmanTable),
            };

            let destination = tc_th & 0x0F;
            if 4 <= destination {
                return Err(Error::BadHuffmanTable);
            }

            // Next 16 bytes are the counts for each code length
            let counts: [u8; 16] = rest
                .get(..16)
                .ok_or(Error::BadHuffmanTable)?
                .try_into()
                .map_err(|_| Error::BadHuffmanTable)?;
            let num_symbols = counts.iter().map(|&count| count as usize).sum::<usize>();

            // Remaining bytes are the symbols, in order of increasing code length
            let symbols = rest
                .get(16..16 + num_symbols)
                .ok_or(Error::BadHuffmanTable)?;

            let table = HuffmanTable::from_counts_and_symbols(&counts, symbols)?;
            self.tables[Self::index(class, destination)] = Some(table);

            bytes = &rest[16 + num_symbols..];
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_canonical_codes() {
        // Two codes of length 2 (00, 01) and one of length 3 (100)
        let mut segment = vec![0x10, 0, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        segment.extend_from_slice(&[0xA, 0xB, 0xC]);

        let mut tables = HuffmanTables::default();
        tables.add_tables(&segment).unwrap();
        let table = tables.get(TableClass::AC, 0).unwrap();

        let data = [0b0110_0001, 0b1111_1111];
        let mut reader = BitReader::new(&data);
        // 01, 100, 00
        assert_eq!(table.decode(&mut reader), Ok(0xB));
        assert_eq!(table.decode(&mut reader), Ok(0xC));
        assert_eq!(table.decode(&mut reader), Ok(0xA));

        // 111 is not a valid code
        assert_eq!(table.decode(&mut reader), Err(Error::BadHuffmanCode));
    }

    #[test]
    fn reject_over_subscribed_table() {
        // Three codes of length 1
        let mut segment = vec![0x00, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        segment.extend_from_slice(&[1, 2, 3]);

        let mut tables = HuffmanTables::default();
        assert_eq!(tables.add_tables(&segment), Err(Error::BadHuffmanTable));
    }

    #[test]
    fn missing_table() {
        let tables = HuffmanTables::default();
        assert!(tables.get(TableClass::DC, 1).is_err());
    }
}
