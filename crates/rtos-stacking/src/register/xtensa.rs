use std::fmt;

/// Xtensa register identifiers, covering the base ISA plus the ESP32,
/// ESP32-S2 and ESP32-S3 specific register files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XtensaReg {
    Pc,
    /// Physical address register `a0`..`a63`.
    Ar(u8),
    Lbeg,
    Lend,
    Lcount,
    Sar,
    WindowBase,
    WindowStart,
    ConfigId0,
    ConfigId1,
    Ps,
    ThreadPtr,
    Br,
    Scompare1,
    AccLo,
    AccHi,
    /// MAC16 data register `m0`..`m3`.
    M(u8),
    ExpState,
    F64RLo,
    F64RHi,
    F64S,
    /// FPU register `f0`..`f15`.
    F(u8),
    Fcr,
    Fsr,
    GpioOut,
    AccX(u8),
    QaccH(u8),
    QaccL(u8),
    SarByte,
    FftBitWidth,
    UaState(u8),
    /// 128-bit vector register `q0`..`q7`.
    Q(u8),
}

impl XtensaReg {
    #[must_use]
    pub const fn bits(self) -> u16 {
        match self {
            Self::Q(_) => 128,
            _ => 32,
        }
    }
}

impl fmt::Display for XtensaReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pc => f.write_str("pc"),
            Self::Ar(n) => write!(f, "a{n}"),
            Self::Lbeg => f.write_str("lbeg"),
            Self::Lend => f.write_str("lend"),
            Self::Lcount => f.write_str("lcount"),
            Self::Sar => f.write_str("sar"),
            Self::WindowBase => f.write_str("windowbase"),
            Self::WindowStart => f.write_str("windowstart"),
            Self::ConfigId0 => f.write_str("configid0"),
            Self::ConfigId1 => f.write_str("configid1"),
            Self::Ps => f.write_str("ps"),
            Self::ThreadPtr => f.write_str("threadptr"),
            Self::Br => f.write_str("br"),
            Self::Scompare1 => f.write_str("scompare1"),
            Self::AccLo => f.write_str("acclo"),
            Self::AccHi => f.write_str("acchi"),
            Self::M(n) => write!(f, "m{n}"),
            Self::ExpState => f.write_str("expstate"),
            Self::F64RLo => f.write_str("f64r_lo"),
            Self::F64RHi => f.write_str("f64r_hi"),
            Self::F64S => f.write_str("f64s"),
            Self::F(n) => write!(f, "f{n}"),
            Self::Fcr => f.write_str("fcr"),
            Self::Fsr => f.write_str("fsr"),
            Self::GpioOut => f.write_str("gpio_out"),
            Self::AccX(n) => write!(f, "accx_{n}"),
            Self::QaccH(n) => write!(f, "qacc_h_{n}"),
            Self::QaccL(n) => write!(f, "qacc_l_{n}"),
            Self::SarByte => f.write_str("sar_byte"),
            Self::FftBitWidth => f.write_str("fft_bit_width"),
            Self::UaState(n) => write!(f, "ua_state_{n}"),
            Self::Q(n) => write!(f, "q{n}"),
        }
    }
}
