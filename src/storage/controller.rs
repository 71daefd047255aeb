//! The storage controller: owns the register file and the simulated RAM.
//!
//! Variables live in registers while they are hot and spill to RAM when
//! evicted. Only variables are ever placed; immediates never need storage
//! because the instruction set carries them inline.

use crate::error::{AllocationError, ConfigError};
use crate::lexer::token::{DataType, Token};

/// One occupied register: the resident token plus the number of times it has
/// been looked up since it was installed.
#[derive(Debug, Clone)]
pub struct RegisterSlot {
    pub token: Token,
    pub access_count: u64,
}

/// One cell of simulated RAM. A reservation's head cell carries the token
/// and the full reserved extent; the cells behind it are `Interior` and have
/// no independent identity.
#[derive(Debug, Clone)]
enum RamCell {
    Free,
    Head { token: Token, extent: usize },
    Interior,
}

impl RamCell {
    fn is_free(&self) -> bool {
        matches!(self, RamCell::Free)
    }
}

/// Register file and simulated RAM with eviction and spill policy.
#[derive(Debug)]
pub struct StorageController {
    registers: Vec<Option<RegisterSlot>>,
    ram: Vec<RamCell>,
}

/// Smallest footprint of a datatype in RAM cells, used when a caller asks
/// for a zero-size reservation.
fn min_footprint(data_type: DataType) -> usize {
    match data_type {
        DataType::Char => 1,
        DataType::Int | DataType::Unsigned => 2,
        DataType::Float | DataType::Long => 4,
        DataType::Void | DataType::Untyped => 1,
    }
}

impl StorageController {
    pub fn new(register_count: usize, ram_size: usize) -> Result<Self, ConfigError> {
        if register_count == 0 {
            return Err(ConfigError::ZeroCapacity { what: "register" });
        }
        if ram_size == 0 {
            return Err(ConfigError::ZeroCapacity { what: "RAM" });
        }
        Ok(Self {
            registers: vec![None; register_count],
            ram: vec![RamCell::Free; ram_size],
        })
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// First-fit reservation of `size` contiguous RAM cells for `token`
    /// (zero means "the datatype's minimum footprint", or the array length
    /// for array heads). Returns the base index. Freed cells are never
    /// compacted, so fragmentation can accumulate over the RAM lifetime.
    pub fn reserve_ram(&mut self, token: &Token, size: usize) -> Result<usize, AllocationError> {
        if token.var_id().is_none() {
            return Err(AllocationError::NotAVariable {
                found: token.to_string(),
            });
        }

        let requested = if size > 0 {
            size
        } else if token.array_size > 0 {
            token.array_size
        } else {
            min_footprint(token.data_type)
        };

        let limit = self.ram.len().checked_sub(requested).map(|l| l + 1);
        for base in 0..limit.unwrap_or(0) {
            if self.ram[base..base + requested].iter().all(RamCell::is_free) {
                self.ram[base] = RamCell::Head {
                    token: token.clone(),
                    extent: requested,
                };
                for cell in &mut self.ram[base + 1..base + requested] {
                    *cell = RamCell::Interior;
                }
                return Ok(base);
            }
        }
        Err(AllocationError::OutOfRam { requested })
    }

    /// Free the cells occupied by `token`: exactly the extent its
    /// reservation recorded, so a reserve/remove pair restores every cell.
    pub fn remove_ram(&mut self, token: &Token) -> Result<(), AllocationError> {
        let id = token.var_id().ok_or_else(|| AllocationError::NotAVariable {
            found: token.to_string(),
        })?;
        let base = self
            .check_ram(token)
            .ok_or(AllocationError::NotResident { id })?;

        let extent = match &self.ram[base] {
            RamCell::Head { extent, .. } => *extent,
            _ => 1,
        };
        let end = (base + extent).min(self.ram.len());
        for cell in &mut self.ram[base..end] {
            *cell = RamCell::Free;
        }
        Ok(())
    }

    /// Make `token` register-resident. Uses an empty slot when one exists;
    /// otherwise evicts the least-accessed slot (first occurrence on ties)
    /// and spills the evicted variable to RAM unless it already lives there.
    /// Returns the slot index the token was installed in.
    pub fn push_register(&mut self, token: &Token) -> Result<usize, AllocationError> {
        if token.var_id().is_none() {
            return Err(AllocationError::NotAVariable {
                found: token.to_string(),
            });
        }

        let slot = match self.registers.iter().position(Option::is_none) {
            Some(empty) => empty,
            None => {
                // Spill before vacating the slot: a failed spill must leave
                // the victim register-resident.
                let victim = self.least_accessed_slot();
                if let Some(evicted) = self.registers[victim].clone() {
                    if self.check_ram(&evicted.token).is_none() {
                        self.reserve_ram(&evicted.token, 0)?;
                    }
                }
                victim
            }
        };

        self.registers[slot] = Some(RegisterSlot {
            token: token.clone(),
            access_count: 0,
        });
        Ok(slot)
    }

    /// Locate `token` in the register file. A hit counts as an access and
    /// feeds the eviction policy.
    pub fn check_register(&mut self, token: &Token) -> Option<usize> {
        let id = token.var_id()?;
        for (index, slot) in self.registers.iter_mut().enumerate() {
            if let Some(resident) = slot {
                if resident.token.var_id() == Some(id) {
                    resident.access_count += 1;
                    return Some(index);
                }
            }
        }
        None
    }

    /// Locate `token` in RAM, skipping over reservation interiors while
    /// scanning.
    pub fn check_ram(&self, token: &Token) -> Option<usize> {
        let id = token.var_id()?;
        let mut index = 0;
        while index < self.ram.len() {
            match &self.ram[index] {
                RamCell::Head { token: head, extent } => {
                    if head.var_id() == Some(id) {
                        return Some(index);
                    }
                    index += (*extent).max(1);
                }
                _ => index += 1,
            }
        }
        None
    }

    /// Arg-min of the access counters, first occurrence on ties. Only called
    /// when every slot is occupied.
    fn least_accessed_slot(&self) -> usize {
        let mut victim = 0;
        let mut lowest = u64::MAX;
        for (index, slot) in self.registers.iter().enumerate() {
            let count = slot.as_ref().map(|s| s.access_count).unwrap_or(0);
            if count < lowest {
                lowest = count;
                victim = index;
            }
        }
        victim
    }
}
