//! Memory-mapped A24 windows
//!
//! A VME bridge exposes its A24 space as a device file (or a sysfs
//! resource) that can be mapped into the process. One window serves data
//! accesses with AM 0x39; an optional second window is programmed by the
//! bridge for the emergency AM 0x19. Local addresses are plain offsets into
//! the window that matches the selected modifier.
//!
//! Only the mapping itself is unsafe. Every access is bounds-checked before
//! the volatile read or write.

use crate::bus::{BusType, VmeBus};
use crate::error::{Result, VldError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use vld_chip::vme::am;

/// Size of a full A24 address space.
pub const A24_SPACE: usize = 1 << 24;

/// Value a bridge returns for an unacknowledged read.
const BUS_ERROR_PATTERN: u32 = 0xFFFF_FFFF;

/// One mapped A24 window.
#[derive(Debug)]
pub struct MappedWindow {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
}

impl MappedWindow {
    /// Map `size` bytes of the window file at `path`.
    ///
    /// Character devices report a zero length, so the size is explicit.
    ///
    /// # Errors
    ///
    /// Returns `WindowNotFound` if the path does not exist, `Io` if it cannot
    /// be opened and `Bus` if the mapping fails.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VldError::WindowNotFound {
                path: path.to_path_buf(),
            });
        }
        if size == 0 {
            return Err(VldError::bus(format!(
                "{}: window size is 0",
                path.display()
            )));
        }

        tracing::debug!("Mapping A24 window {} ({size:#x} bytes)", path.display());

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // SAFETY: the descriptor was just opened read/write, size is non-zero,
        // offset 0 starts the window and MAP_SHARED is required for device
        // memory. The file is stored alongside the pointer so the mapping
        // outlives every access, and Drop unmaps with the same size.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| VldError::bus(format!("mmap of {} failed: {e}", path.display())))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| VldError::bus("mmap returned a null mapping"))?;

        tracing::info!("Mapped {} at {ptr:p}", path.display());

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 || offset + 4 > self.size {
            return Err(VldError::bus(format!(
                "Out of bounds access: offset={offset:#x}, limit={:#x}",
                self.size
            )));
        }
        Ok(())
    }

    /// Read a 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is unaligned or out of bounds.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;

        // SAFETY: offset is 4-byte aligned and offset + 4 <= size (checked
        // above), the pointer comes from a live mapping, and the read must be
        // volatile because registers change under the CPU.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    /// Write a 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is unaligned or out of bounds.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;
        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: same bounds and alignment guarantees as `read_u32`; writes
        // have side effects on the board so they must not be elided.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }

    /// Mapped size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Window file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MappedWindow {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {}", self.path.display());

        // SAFETY: ptr and size are exactly what mmap returned and was given in
        // `open`; the mapping has not been unmapped before.
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.size) } {
            tracing::error!("munmap failed during drop: {e}");
        }
    }
}

// SAFETY: the window owns its mapping exclusively and the mapping is valid
// from any thread of the process.
unsafe impl Send for MappedWindow {}

/// VME bus backed by mapped A24 windows.
#[derive(Debug)]
pub struct MappedBus {
    data: MappedWindow,
    emergency: Option<MappedWindow>,
    a24_am: u8,
    locked: bool,
}

impl MappedBus {
    /// Map the data window and, if given, the emergency window.
    ///
    /// # Errors
    ///
    /// Returns the first mapping error.
    pub fn open(data: impl AsRef<Path>, emergency: Option<&Path>) -> Result<Self> {
        let data = MappedWindow::open(data, A24_SPACE)?;
        let emergency = emergency
            .map(|path| MappedWindow::open(path, A24_SPACE))
            .transpose()?;
        Ok(Self {
            data,
            emergency,
            a24_am: am::DEFAULT,
            locked: false,
        })
    }

    fn window(&self) -> Result<&MappedWindow> {
        match self.a24_am {
            am::EMERGENCY => self
                .emergency
                .as_ref()
                .ok_or_else(|| VldError::bus("no emergency window mapped")),
            _ => Ok(&self.data),
        }
    }

    fn window_mut(&mut self) -> Result<&mut MappedWindow> {
        match self.a24_am {
            am::EMERGENCY => self
                .emergency
                .as_mut()
                .ok_or_else(|| VldError::bus("no emergency window mapped")),
            _ => Ok(&mut self.data),
        }
    }
}

impl VmeBus for MappedBus {
    fn bus_to_local(&mut self, modifier: u8, address: u32) -> Result<usize> {
        let limit = match modifier {
            am::A24_DATA => self.data.size(),
            am::EMERGENCY => self.emergency.as_ref().map_or(0, MappedWindow::size),
            other => {
                return Err(VldError::addressing(
                    address,
                    format!("address modifier {other:#x} not mapped"),
                ))
            }
        };
        let local = address as usize;
        if local + 4 > limit {
            return Err(VldError::addressing(address, "outside the mapped A24 window"));
        }
        Ok(local)
    }

    fn probe32(&mut self, local: usize) -> Result<u32> {
        let value = self.window()?.read_u32(local)?;
        if value == BUS_ERROR_PATTERN {
            #[allow(clippy::cast_possible_truncation)]
            return Err(VldError::addressing(local as u32, "no response"));
        }
        Ok(value)
    }

    fn read32(&mut self, local: usize) -> Result<u32> {
        self.window()?.read_u32(local)
    }

    fn write32(&mut self, local: usize, value: u32) -> Result<()> {
        self.window_mut()?.write_u32(local, value)
    }

    fn lock(&mut self) {
        if self.locked {
            tracing::warn!("Bus lock taken twice");
        }
        self.locked = true;
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn set_a24_am(&mut self, modifier: u8) -> Result<()> {
        if modifier == am::EMERGENCY && self.emergency.is_none() {
            return Err(VldError::bus(
                "emergency AM requested but no emergency window is mapped",
            ));
        }
        tracing::debug!("A24 address modifier -> {modifier:#x}");
        self.a24_am = modifier;
        Ok(())
    }

    fn bus_type(&self) -> BusType {
        BusType::Mapped
    }
}
