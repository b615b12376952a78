//! The live Windows registry.

use std::ptr;

use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegEnumKeyExW, RegNotifyChangeKeyValue, RegOpenKeyExW,
    RegSetKeyValueW, HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER,
    HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_ENUMERATE_SUB_KEYS, KEY_NOTIFY, KEY_READ, KEY_WRITE,
    REG_BINARY, REG_CREATED_NEW_KEY, REG_DWORD, REG_LINK, REG_NOTIFY_CHANGE_LAST_SET,
    REG_NOTIFY_CHANGE_NAME, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE,
};

use super::{
    Access, Disposition, Hive, RegValue, Registry, RegistryKey, StoreError, StoreResult,
    ValueKind,
};
use crate::path::KeyPath;

/// Longest key name the registry allows, in UTF-16 units.
const MAX_KEY_NAME_LEN: usize = 255;

/// The registry of the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRegistry;

impl Registry for NativeRegistry {
    type Key = NativeKey;

    fn hive(&self, hive: Hive) -> StoreResult<NativeKey> {
        let hkey = match hive {
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::Users => HKEY_USERS,
            Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
        };
        Ok(NativeKey {
            hkey,
            owned: false,
            name: hive.to_string(),
        })
    }
}

/// An open registry key handle, closed on drop.
#[derive(Debug)]
pub struct NativeKey {
    hkey: HKEY,
    // Predefined hive handles are never closed.
    owned: bool,
    name: String,
}

impl NativeKey {
    fn sub_name(&self, path: &KeyPath) -> String {
        if path.is_root() {
            self.name.clone()
        } else {
            format!("{}\\{}", self.name, path)
        }
    }

    fn owned(hkey: HKEY, name: String) -> Self {
        Self {
            hkey,
            owned: true,
            name,
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(call: &'static str, status: WIN32_ERROR, name: &str) -> StoreResult<()> {
    match status {
        ERROR_SUCCESS => Ok(()),
        ERROR_FILE_NOT_FOUND => Err(StoreError::NotFound(name.to_string())),
        ERROR_ACCESS_DENIED => Err(StoreError::AccessDenied(name.to_string())),
        status => Err(StoreError::Os {
            call,
            source: std::io::Error::from_raw_os_error(status as i32),
        }),
    }
}

fn sam(access: Access) -> REG_SAM_FLAGS {
    match access {
        Access::Enumerate => KEY_ENUMERATE_SUB_KEYS,
        Access::Read => KEY_READ,
        Access::Write => KEY_WRITE,
        Access::Notify => KEY_NOTIFY,
    }
}

fn value_type(kind: ValueKind) -> REG_VALUE_TYPE {
    match kind {
        ValueKind::Sz => REG_SZ,
        ValueKind::Binary => REG_BINARY,
        ValueKind::Dword => REG_DWORD,
        ValueKind::Link => REG_LINK,
    }
}

impl RegistryKey for NativeKey {
    fn open(&self, path: &KeyPath, access: Access) -> StoreResult<Self> {
        let name = self.sub_name(path);
        let sub_key = wide(&path.to_string());
        let mut hkey: HKEY = ptr::null_mut();
        // SAFETY: `sub_key` is null terminated and outlives the call.
        let status = unsafe { RegOpenKeyExW(self.hkey, sub_key.as_ptr(), 0, sam(access), &mut hkey) };
        check("RegOpenKeyExW", status, &name)?;
        Ok(NativeKey::owned(hkey, name))
    }

    fn enum_child(&self, index: u32) -> StoreResult<Option<String>> {
        let mut buf = [0u16; MAX_KEY_NAME_LEN + 1];
        let mut len = buf.len() as u32;
        // SAFETY: `len` holds the capacity of `buf`, optional outputs are null.
        let status = unsafe {
            RegEnumKeyExW(
                self.hkey,
                index,
                buf.as_mut_ptr(),
                &mut len,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if status == ERROR_NO_MORE_ITEMS {
            return Ok(None);
        }
        check("RegEnumKeyExW", status, &self.name)?;
        Ok(Some(String::from_utf16_lossy(&buf[..len as usize])))
    }

    fn create(&self, path: &KeyPath) -> StoreResult<Disposition> {
        let name = self.sub_name(path);
        let sub_key = wide(&path.to_string());
        let mut hkey: HKEY = ptr::null_mut();
        let mut disposition = 0;
        // SAFETY: all pointers are valid for the duration of the call.
        let status = unsafe {
            RegCreateKeyExW(
                self.hkey,
                sub_key.as_ptr(),
                0,
                ptr::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_READ,
                ptr::null(),
                &mut hkey,
                &mut disposition,
            )
        };
        check("RegCreateKeyExW", status, &name)?;
        drop(NativeKey::owned(hkey, name));
        Ok(if disposition == REG_CREATED_NEW_KEY {
            Disposition::CreatedNew
        } else {
            Disposition::OpenedExisting
        })
    }

    fn set_value(&self, path: &KeyPath, name: &str, value: &RegValue) -> StoreResult<()> {
        let sub_key = wide(&path.to_string());
        let value_name = wide(name);
        let data = value.to_bytes();
        // SAFETY: `data` is valid for `data.len()` bytes, names are null terminated.
        let status = unsafe {
            RegSetKeyValueW(
                self.hkey,
                sub_key.as_ptr(),
                value_name.as_ptr(),
                value_type(value.kind()),
                data.as_ptr().cast(),
                data.len() as u32,
            )
        };
        check("RegSetKeyValueW", status, &self.sub_name(path))
    }

    fn watch(&self, subtree: bool) -> StoreResult<()> {
        // SAFETY: synchronous notification, no event handle involved.
        let status = unsafe {
            RegNotifyChangeKeyValue(
                self.hkey,
                subtree.into(),
                REG_NOTIFY_CHANGE_NAME | REG_NOTIFY_CHANGE_LAST_SET,
                ptr::null_mut(),
                0,
            )
        };
        check("RegNotifyChangeKeyValue", status, &self.name)
    }
}

impl Drop for NativeKey {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: the handle came from RegOpenKeyExW/RegCreateKeyExW and is closed once.
            let status = unsafe { RegCloseKey(self.hkey) };
            if status != ERROR_SUCCESS {
                tracing::warn!(key = %self.name, status, "RegCloseKey failed");
            }
        }
    }
}
