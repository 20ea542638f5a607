//! HCI opcodes issued during controller bring-up.

/// Opcode group field for vendor-specific commands.
pub const OGF_VENDOR: u16 = 0x3F;

/// Packed 16-bit HCI command opcode (OGF in the top 6 bits, OCF in the rest).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

impl Opcode {
    pub const fn new(ogf: u16, ocf: u16) -> Opcode {
        Opcode((ogf << 10) | (ocf & 0x03ff))
    }

    pub fn ogf(&self) -> u16 {
        self.0 >> 10
    }

    pub fn ocf(&self) -> u16 {
        self.0 & 0x03ff
    }

    pub fn is_vendor(&self) -> bool {
        self.ogf() == OGF_VENDOR
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

pub const HCI_RESET: Opcode = Opcode(0x0C03);
pub const HCI_VSC_WRITE_SLEEP_MODE: Opcode = Opcode(0xFC27);
pub const HCI_VSC_WRITE_SCO_PCM_INT_PARAM: Opcode = Opcode(0xFC1C);
pub const HCI_VSC_WRITE_PCM_DATA_FORMAT_PARAM: Opcode = Opcode(0xFC1E);
pub const HCI_VSC_WRITE_I2SPCM_INTERFACE_PARAM: Opcode = Opcode(0xFC6D);
pub const HCI_INTEL_MANUFACTURE: Opcode = Opcode(0xFC11);
pub const HCI_INTEL_RDSW_VERSION: Opcode = Opcode(0xFC05);
pub const HCI_INTEL_MEMWRITE: Opcode = Opcode(0xFC8E);
pub const HCI_INTEL_SW_RF_KILL: Opcode = Opcode(0xFC3F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ogf_ocf_split() {
        assert_eq!(HCI_RESET.ogf(), 0x03);
        assert_eq!(HCI_RESET.ocf(), 0x03);
        assert_eq!(Opcode::new(0x03, 0x03), HCI_RESET);
    }

    #[test]
    fn test_vendor_group() {
        assert!(HCI_INTEL_MANUFACTURE.is_vendor());
        assert!(HCI_VSC_WRITE_SLEEP_MODE.is_vendor());
        assert!(!HCI_RESET.is_vendor());
        assert_eq!(HCI_INTEL_MEMWRITE.to_string(), "0xFC8E");
    }
}
