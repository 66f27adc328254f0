use serde::ser::{Serialize, SerializeMap, Serializer};

/// The 21 registers shown by the console, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    AX, AH, AL,
    BX, BH, BL,
    CX, CH, CL,
    DX, DH, DL,
    SI, DI, SP, BP, IP,
    CS, DS, ES, SS,
}

impl Register {
    pub const ALL: [Register; 21] = [
        Register::AX, Register::AH, Register::AL,
        Register::BX, Register::BH, Register::BL,
        Register::CX, Register::CH, Register::CL,
        Register::DX, Register::DH, Register::DL,
        Register::SI, Register::DI, Register::SP, Register::BP, Register::IP,
        Register::CS, Register::DS, Register::ES, Register::SS,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Register::AX => "AX",
            Register::AH => "AH",
            Register::AL => "AL",
            Register::BX => "BX",
            Register::BH => "BH",
            Register::BL => "BL",
            Register::CX => "CX",
            Register::CH => "CH",
            Register::CL => "CL",
            Register::DX => "DX",
            Register::DH => "DH",
            Register::DL => "DL",
            Register::SI => "SI",
            Register::DI => "DI",
            Register::SP => "SP",
            Register::BP => "BP",
            Register::IP => "IP",
            Register::CS => "CS",
            Register::DS => "DS",
            Register::ES => "ES",
            Register::SS => "SS",
        }
    }

    pub fn from_name(name: &str) -> Option<Register> {
        Register::ALL.iter().copied().find(|reg| reg.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Status flags, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    Carry,
    Parity,
    AuxiliaryCarry,
    Zero,
    Sign,
    Overflow,
    Direction,
    Interrupt,
    Trap,
}

impl Flag {
    pub const ALL: [Flag; 9] = [
        Flag::Carry,
        Flag::Parity,
        Flag::AuxiliaryCarry,
        Flag::Zero,
        Flag::Sign,
        Flag::Overflow,
        Flag::Direction,
        Flag::Interrupt,
        Flag::Trap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Flag::Carry => "CF",
            Flag::Parity => "PF",
            Flag::AuxiliaryCarry => "AF",
            Flag::Zero => "ZF",
            Flag::Sign => "SF",
            Flag::Overflow => "OF",
            Flag::Direction => "DF",
            Flag::Interrupt => "IF",
            Flag::Trap => "TF",
        }
    }

    pub fn from_name(name: &str) -> Option<Flag> {
        Flag::ALL.iter().copied().find(|flag| flag.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Render a 16-bit value the way the register panel shows it: `0x002A (42)`.
pub fn format_word(value: u16) -> String {
    format!("0x{:04X} ({})", value, value)
}

/// Display strings for every register. All 21 entries always exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSet {
    values: [String; 21],
}

impl RegisterSet {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| format_word(0)),
        }
    }

    pub fn get(&self, register: Register) -> &str {
        &self.values[register.index()]
    }

    pub fn set(&mut self, register: Register, display: String) {
        self.values[register.index()] = display;
    }

    /// Entries in the fixed display order, independent of update order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, &str)> + '_ {
        Register::ALL.iter().map(move |&reg| (reg, self.get(reg)))
    }
}

impl Default for RegisterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for RegisterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Register::ALL.len()))?;
        for (register, display) in self.iter() {
            map.serialize_entry(register.name(), display)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagSet {
    values: [bool; 9],
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flag: Flag) -> bool {
        self.values[flag.index()]
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        self.values[flag.index()] = value;
    }

    /// The panel shows flags as "1"/"0".
    pub fn display(&self, flag: Flag) -> &'static str {
        if self.get(flag) { "1" } else { "0" }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flag, bool)> + '_ {
        Flag::ALL.iter().map(move |&flag| (flag, self.get(flag)))
    }
}

impl Serialize for FlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Flag::ALL.len()))?;
        for flag in Flag::ALL {
            map.serialize_entry(flag.name(), self.display(flag))?;
        }
        map.end()
    }
}
