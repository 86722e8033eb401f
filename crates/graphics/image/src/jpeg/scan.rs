//! Entropy decoding of a single scan into the coefficient buffers of the frame components

use super::{
    bit_reader::BitReader,
    cosine_transform::ZIGZAG_TO_NATURAL,
    frame_header::{CodingScheme, FrameHeader},
    huffman_table::{HuffmanTable, HuffmanTables, TableClass},
    Component, Error,
};

/// Interleaved scans may contain at most this many blocks per MCU
const MAX_BLOCKS_PER_MCU: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into the components of the frame
    pub component_index: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

#[derive(Clone, Debug)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_selection_start: u8,
    pub spectral_selection_end: u8,
    pub successive_approximation_high: u8,
    pub successive_approximation_low: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

impl ScanHeader {
    pub fn new(bytes: &[u8], frame: &FrameHeader) -> Result<Self, Error> {
        let (&num_components, rest) = bytes.split_first().ok_or(Error::BadScan)?;
        let num_components = num_components as usize;

        if !(1..=4).contains(&num_components) || rest.len() != 2 * num_components + 3 {
            return Err(Error::BadScan);
        }

        let mut components = Vec::with_capacity(num_components);
        for data in rest[..2 * num_components].chunks_exact(2) {
            let component_index = frame
                .components
                .iter()
                .position(|component| component.id == data[0])
                .ok_or_else(|| {
                    log::error!("Scan references unknown component {}", data[0]);
                    Error::BadScan
                })?;

            if components
                .iter()
                .any(|other: &ScanComponent| other.component_index == component_index)
            {
                return Err(Error::BadScan);
            }

            let component = ScanComponent {
                component_index,
                dc_table: data[1] >> 4,
                ac_table: data[1] & 0x0F,
            };
            components.push(component);
        }

        let parameters = &rest[2 * num_components..];
        let header = Self {
            components,
            spectral_selection_start: parameters[0],
            spectral_selection_end: parameters[1],
            successive_approximation_high: parameters[2] >> 4,
            successive_approximation_low: parameters[2] & 0x0F,
        };

        if 1 < header.components.len() {
            let blocks_per_mcu: usize = header
                .components
                .iter()
                .map(|scan_component| {
                    let component = &frame.components[scan_component.component_index];
                    component.horizontal_sampling_factor as usize
                        * component.vertical_sampling_factor as usize
                })
                .sum();

            if MAX_BLOCKS_PER_MCU < blocks_per_mcu {
                log::error!("Scan has {blocks_per_mcu} blocks per MCU");
                return Err(Error::BadScan);
            }
        }

        header.validate(frame.coding_scheme)?;
        Ok(header)
    }

    fn validate(&self, coding_scheme: CodingScheme) -> Result<(), Error> {
        let start = self.spectral_selection_start;
        let end = self.spectral_selection_end;
        let high = self.successive_approximation_high;
        let low = self.successive_approximation_low;

        let is_valid = match coding_scheme {
            // Encoders are not consistent about Ah/Al in sequential scans, so those are ignored
            CodingScheme::SequentialDiscreteCosineTransform => start == 0 && end == 63,
            CodingScheme::ProgressiveDiscreteCosineTransform => {
                let spectral_selection_is_valid = if start == 0 {
                    end == 0
                } else {
                    start <= end && end <= 63 && self.components.len() == 1
                };

                spectral_selection_is_valid && low <= 13 && (high == 0 || high == low + 1)
            },
            CodingScheme::Lossless => false,
        };

        if !is_valid {
            log::error!(
                "Invalid scan parameters: Ss={start} Se={end} Ah={high} Al={low} for {coding_scheme:?}"
            );
            return Err(Error::BadScan);
        }

        Ok(())
    }

    fn pass(&self, coding_scheme: CodingScheme) -> Pass {
        if coding_scheme == CodingScheme::SequentialDiscreteCosineTransform {
            return Pass::Sequential;
        }

        match (
            self.spectral_selection_start == 0,
            self.successive_approximation_high == 0,
        ) {
            (true, true) => Pass::DcFirst,
            (true, false) => Pass::DcRefine,
            (false, true) => Pass::AcFirst,
            (false, false) => Pass::AcRefine,
        }
    }
}

/// The huffman tables a scan component needs in the current pass
#[derive(Clone, Copy)]
struct ComponentTables<'a> {
    dc: Option<&'a HuffmanTable>,
    ac: Option<&'a HuffmanTable>,
}

struct EntropyDecoder<'a> {
    reader: BitReader<'a>,

    /// Number of remaining blocks in the current end-of-band run
    eob_run: u32,
    pass: Pass,
    start: usize,
    end: usize,
    low_bit: u8,
}

/// Decode the entropy coded `data` of a scan, updating the coefficients of the involved components
pub(super) fn decode_scan(
    header: &ScanHeader,
    data: &[u8],
    frame: &FrameHeader,
    components: &mut [Component],
    huffman_tables: &HuffmanTables,
    restart_interval: u16,
) -> Result<(), Error> {
    let pass = header.pass(frame.coding_scheme);

    let mut tables = Vec::with_capacity(header.components.len());
    for scan_component in &header.components {
        let dc = match pass {
            Pass::Sequential | Pass::DcFirst => {
                Some(huffman_tables.get(TableClass::DC, scan_component.dc_table)?)
            },
            _ => None,
        };
        let ac = match pass {
            Pass::Sequential | Pass::AcFirst | Pass::AcRefine => {
                Some(huffman_tables.get(TableClass::AC, scan_component.ac_table)?)
            },
            _ => None,
        };
        tables.push(ComponentTables { dc, ac });
    }

    let mut decoder = EntropyDecoder {
        reader: BitReader::new(data),
        eob_run: 0,
        pass,
        start: header.spectral_selection_start as usize,
        end: header.spectral_selection_end as usize,
        low_bit: if pass == Pass::Sequential {
            0
        } else {
            header.successive_approximation_low
        },
    };

    let restart_interval = restart_interval as usize;
    let handle_restart = |decoder: &mut EntropyDecoder<'_>,
                              components: &mut [Component],
                              unit: usize| {
        if restart_interval != 0 && unit != 0 && unit % restart_interval == 0 {
            decoder.reader.align_to_byte();
            decoder.eob_run = 0;
            for scan_component in &header.components {
                components[scan_component.component_index].dc_prediction = 0;
            }
        }
    };

    if let [scan_component] = header.components.as_slice() {
        // Non-interleaved scans cover only the blocks inside the component, one block at a time
        let index = scan_component.component_index;
        let width = components[index].width_in_blocks;
        let height = components[index].height_in_blocks;

        for unit in 0..width * height {
            handle_restart(&mut decoder, components, unit);

            let component = &mut components[index];
            let block_index = (unit / width) * component.blocks_per_line + unit % width;
            decoder.decode_block(component, block_index, tables[0])?;
        }
    } else {
        let (mcus_per_line, mcus_per_column) = frame.mcus();

        for unit in 0..mcus_per_line * mcus_per_column {
            handle_restart(&mut decoder, components, unit);

            let mcu_x = unit % mcus_per_line;
            let mcu_y = unit / mcus_per_line;

            for (scan_component, &component_tables) in header.components.iter().zip(&tables) {
                let component = &mut components[scan_component.component_index];
                let horizontal = component.horizontal_sampling_factor as usize;
                let vertical = component.vertical_sampling_factor as usize;

                for block_y in 0..vertical {
                    for block_x in 0..horizontal {
                        let x = mcu_x * horizontal + block_x;
                        let y = mcu_y * vertical + block_y;
                        let block_index = y * component.blocks_per_line + x;
                        decoder.decode_block(component, block_index, component_tables)?;
                    }
                }
            }
        }
    }

    Ok(())
}

impl<'a> EntropyDecoder<'a> {
    fn decode_block(
        &mut self,
        component: &mut Component,
        block_index: usize,
        tables: ComponentTables<'_>,
    ) -> Result<(), Error> {
        let block = component
            .coefficients
            .get_mut(block_index)
            .ok_or(Error::BadScan)?;
        let prediction = &mut component.dc_prediction;

        match (self.pass, tables.dc, tables.ac) {
            (Pass::Sequential, Some(dc), Some(ac)) => {
                self.decode_dc(block, prediction, dc)?;
                self.decode_sequential_ac(block, ac)
            },
            (Pass::DcFirst, Some(dc), _) => self.decode_dc(block, prediction, dc),
            (Pass::DcRefine, ..) => {
                if self.reader.read_bit()? {
                    block[0] |= 1 << self.low_bit;
                }
                Ok(())
            },
            (Pass::AcFirst, _, Some(ac)) => self.decode_ac_first(block, ac),
            (Pass::AcRefine, _, Some(ac)) => self.decode_ac_refine(block, ac),
            _ => Err(Error::UndefinedHuffmanTable),
        }
    }

    fn decode_dc(
        &mut self,
        block: &mut [i16; 64],
        prediction: &mut i32,
        table: &HuffmanTable,
    ) -> Result<(), Error> {
        let magnitude = table.decode(&mut self.reader)?;
        if 11 < magnitude {
            return Err(Error::BadScan);
        }

        let difference = self.reader.receive_extend(magnitude)?;
        *prediction = prediction.wrapping_add(difference);
        block[0] = prediction.wrapping_shl(self.low_bit as u32) as i16;

        Ok(())
    }

    fn decode_sequential_ac(
        &mut self,
        block: &mut [i16; 64],
        table: &HuffmanTable,
    ) -> Result<(), Error> {
        let mut k = 1;
        while k < 64 {
            let symbol = table.decode(&mut self.reader)?;
            let run_length = (symbol >> 4) as usize;
            let magnitude = symbol & 0x0F;

            if magnitude == 0 {
                if run_length == 15 {
                    // ZRL, sixteen zeros
                    k += 16;
                    continue;
                }

                // End of block
                break;
            }

            k += run_length;
            if 63 < k {
                log::error!("AC coefficient index out of range");
                return Err(Error::BadScan);
            }

            block[ZIGZAG_TO_NATURAL[k]] = self.reader.receive_extend(magnitude)? as i16;
            k += 1;
        }

        Ok(())
    }

    fn decode_ac_first(&mut self, block: &mut [i16; 64], table: &HuffmanTable) -> Result<(), Error> {
        if 0 < self.eob_run {
            self.eob_run -= 1;
            return Ok(());
        }

        let mut k = self.start;
        while k <= self.end {
            let symbol = table.decode(&mut self.reader)?;
            let run_length = symbol >> 4;
            let magnitude = symbol & 0x0F;

            if magnitude == 0 {
                if run_length < 15 {
                    // This block ends a band, maybe along with the next few ones
                    self.eob_run = (1 << run_length) - 1;
                    self.eob_run += self.reader.read_bits(run_length)? as u32;
                    break;
                }

                k += 16;
                continue;
            }

            k += run_length as usize;
            if self.end < k {
                log::error!("AC coefficient index out of range");
                return Err(Error::BadScan);
            }

            let value = self.reader.receive_extend(magnitude)?;
            block[ZIGZAG_TO_NATURAL[k]] = value.wrapping_shl(self.low_bit as u32) as i16;
            k += 1;
        }

        Ok(())
    }

    fn decode_ac_refine(&mut self, block: &mut [i16; 64], table: &HuffmanTable) -> Result<(), Error> {
        let positive_bit: i16 = 1 << self.low_bit;
        let negative_bit: i16 = -1 << self.low_bit;

        let mut k = self.start;

        if self.eob_run == 0 {
            while k <= self.end {
                let symbol = table.decode(&mut self.reader)?;
                let mut zeros_to_skip = symbol >> 4;
                let magnitude = symbol & 0x0F;

                let mut new_value = 0;
                if magnitude != 0 {
                    // Newly significant coefficients can only be +-1 in refinement scans
                    if magnitude != 1 {
                        return Err(Error::BadScan);
                    }

                    new_value = if self.reader.read_bit()? {
                        positive_bit
                    } else {
                        negative_bit
                    };
                } else if zeros_to_skip != 15 {
                    self.eob_run = 1 << zeros_to_skip;
                    self.eob_run += self.reader.read_bits(zeros_to_skip)? as u32;
                    break;
                }

                // Refine nonzero coefficients until the target zero coefficient is reached
                while k <= self.end {
                    let coefficient = &mut block[ZIGZAG_TO_NATURAL[k]];
                    if *coefficient != 0 {
                        self.refine(coefficient, positive_bit, negative_bit)?;
                    } else {
                        if zeros_to_skip == 0 {
                            break;
                        }
                        zeros_to_skip -= 1;
                    }
                    k += 1;
                }

                if new_value != 0 {
                    if self.end < k {
                        return Err(Error::BadScan);
                    }
                    block[ZIGZAG_TO_NATURAL[k]] = new_value;
                }

                k += 1;
            }
        }

        if 0 < self.eob_run {
            // The rest of the band contains no new coefficients, but existing ones are still refined
            while k <= self.end {
                let coefficient = &mut block[ZIGZAG_TO_NATURAL[k]];
                if *coefficient != 0 {
                    self.refine(coefficient, positive_bit, negative_bit)?;
                }
                k += 1;
            }

            self.eob_run -= 1;
        }

        Ok(())
    }

    fn refine(
        &mut self,
        coefficient: &mut i16,
        positive_bit: i16,
        negative_bit: i16,
    ) -> Result<(), Error> {
        if self.reader.read_bit()? && (*coefficient & positive_bit) == 0 {
            if 0 <= *coefficient {
                *coefficient = coefficient.wrapping_add(positive_bit);
            } else {
                *coefficient = coefficient.wrapping_add(negative_bit);
            }
        }

        Ok(())
    }
}
