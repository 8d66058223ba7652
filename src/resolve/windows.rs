//! Name lookups backed by the running system.

use core::ffi::{CStr, c_void};
use core::ptr::{null, null_mut};
use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, trace};
use widestring::{U16CStr, U16CString};
use windows_sys::Win32::Foundation::{
    ERROR_INSUFFICIENT_BUFFER, ERROR_SUCCESS, GetLastError, LocalFree,
};
use windows_sys::Win32::Security::{GetLengthSid, IsValidSid, LookupAccountSidW, PSID};
use windows_sys::Win32::System::LibraryLoader::{
    GetProcAddress, LOAD_LIBRARY_SEARCH_SYSTEM32, LoadLibraryExW,
};
use windows_sys::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, HKEY_USERS, RRF_RT_REG_SZ, RegGetValueW,
};
use windows_sys::core::{HRESULT, PCWSTR, PWSTR};

use super::NameLookup;
use crate::{DomainAndName, PlatformSupport, Sid, SidIdentifierAuthority, SidType};

type DeriveCapabilitySidsFn = unsafe extern "system" fn(
    PCWSTR,
    *mut *mut PSID,
    *mut u32,
    *mut *mut PSID,
    *mut u32,
) -> i32;
type LookupMonikerFn = unsafe extern "system" fn(PSID, *mut PWSTR) -> HRESULT;
type FreeMemoryFn = unsafe extern "system" fn(*mut c_void) -> u8;

const MAPPINGS: &str =
    r"Software\Classes\Local Settings\Software\Microsoft\Windows\CurrentVersion\AppContainer\Mappings\";
const DEFAULT_PROFILE: &str = r".DEFAULT\";

/// Capability SIDs that predate name derivation (`S-1-15-3-<rid>`).
const LEGACY_CAPABILITIES: [(u32, &str); 12] = [
    (1, "internetClient"),
    (2, "internetClientServer"),
    (3, "privateNetworkClientServer"),
    (4, "picturesLibrary"),
    (5, "videosLibrary"),
    (6, "musicLibrary"),
    (7, "documentsLibrary"),
    (8, "enterpriseAuthentication"),
    (9, "sharedUserCertificates"),
    (10, "removableStorage"),
    (11, "appointments"),
    (12, "contacts"),
];

/// Capability names hashed into SIDs when the OS can derive them.
pub const CAPABILITY_NAMES: &[&str] = &[
    "activity",
    "allJoyn",
    "appBroadcastServices",
    "appDiagnostics",
    "appLicensing",
    "backgroundMediaPlayback",
    "blockedChatMessages",
    "bluetooth",
    "broadFileSystemAccess",
    "chat",
    "codeGeneration",
    "confirmAppClose",
    "cortanaSettings",
    "cortanaSpeechAccessory",
    "developmentModeNetwork",
    "deviceManagementDmAccount",
    "documentsLibrary",
    "enterpriseDataPolicy",
    "extendedExecutionUnconstrained",
    "gazeInput",
    "globalMediaControl",
    "graphicsCapture",
    "humaninterfacedevice",
    "inputInjectionBrokered",
    "internetClient",
    "internetClientServer",
    "location",
    "lpacAppExperience",
    "lpacCom",
    "lpacCryptoServices",
    "lpacEnterprisePolicyChangeNotifications",
    "lpacIdentityServices",
    "lpacInstrumentation",
    "lpacMedia",
    "lpacPackageManagerOperation",
    "lpacPnPNotifications",
    "lpacPrinting",
    "lpacServicesManagement",
    "lpacSessionManagement",
    "lpacWebPlatform",
    "microphone",
    "packageManagement",
    "packageQuery",
    "phoneCall",
    "privateNetworkClientServer",
    "registryRead",
    "runFullTrust",
    "sharedUserCertificates",
    "systemManagement",
    "unvirtualizedResources",
    "userAccountInformation",
    "userDataTasks",
    "userNotificationListener",
    "userSystemId",
    "videosLibrary",
    "webcam",
    "wiFiControl",
];

fn symbol(module: &str, name: &CStr) -> Option<unsafe extern "system" fn() -> isize> {
    let module = U16CString::from_str(module).ok()?;
    // SAFETY: `module` is a NUL-terminated path; no file handle is passed.
    let handle =
        unsafe { LoadLibraryExW(module.as_ptr(), null_mut(), LOAD_LIBRARY_SEARCH_SYSTEM32) };
    if handle.is_null() {
        return None;
    }
    // SAFETY: `handle` is a loaded module and `name` is NUL-terminated.
    unsafe { GetProcAddress(handle, name.as_ptr().cast()) }
}

/// `kernelbase!DeriveCapabilitySidsFromName`.
fn derive_capability_sids_fn() -> Option<DeriveCapabilitySidsFn> {
    let proc = symbol("kernelbase.dll", c"DeriveCapabilitySidsFromName")?;
    // SAFETY: the export has this signature.
    Some(unsafe {
        core::mem::transmute::<unsafe extern "system" fn() -> isize, DeriveCapabilitySidsFn>(proc)
    })
}

/// `kernel.appcore!AppContainerLookupMoniker` and its matching free.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AppContainerFns {
    lookup: LookupMonikerFn,
    free: FreeMemoryFn,
}

/// Both app container exports.
fn app_container_moniker_fns() -> Option<AppContainerFns> {
    let lookup = symbol("kernel.appcore.dll", c"AppContainerLookupMoniker")?;
    let free = symbol("kernel.appcore.dll", c"AppContainerFreeMemory")?;
    #[expect(
        clippy::multiple_unsafe_ops_per_block,
        reason = "Same operation so same safety doc"
    )]
    // SAFETY: the exports have these signatures.
    let fns = unsafe {
        AppContainerFns {
            lookup: core::mem::transmute::<unsafe extern "system" fn() -> isize, LookupMonikerFn>(
                lookup,
            ),
            free: core::mem::transmute::<unsafe extern "system" fn() -> isize, FreeMemoryFn>(free),
        }
    };
    Some(fns)
}

/// Optional OS exports, resolved by [`PlatformSupport::detect`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntryPoints {
    pub(crate) derive_capability_sids: Option<DeriveCapabilitySidsFn>,
    pub(crate) app_container: Option<AppContainerFns>,
}

impl EntryPoints {
    pub(crate) const NONE: Self = Self {
        derive_capability_sids: None,
        app_container: None,
    };

    pub(crate) fn probe() -> Self {
        Self {
            derive_capability_sids: derive_capability_sids_fn(),
            app_container: app_container_moniker_fns(),
        }
    }
}

/// SID copied into 4-byte aligned storage for the OS.
struct RawSid(SmallVec<[u32; 17]>);

impl RawSid {
    fn new(sid: &Sid) -> Self {
        Self(
            sid.to_bytes()
                .chunks_exact(4)
                .map(|chunk| {
                    let mut word = [0; 4];
                    word.copy_from_slice(chunk);
                    u32::from_ne_bytes(word)
                })
                .collect(),
        )
    }

    fn as_psid(&self) -> PSID {
        self.0.as_ptr().cast_mut().cast()
    }
}

/// Copies an OS-owned SID.
///
/// # Safety
/// `psid` is null or points to a readable SID.
unsafe fn sid_from_raw(psid: PSID) -> Option<Sid> {
    // SAFETY: checked non-null; `IsValidSid` only reads the header it validates.
    if psid.is_null() || unsafe { IsValidSid(psid) } == 0 {
        return None;
    }
    // SAFETY: `psid` is a valid SID.
    let len = unsafe { GetLengthSid(psid) } as usize;
    // SAFETY: a valid SID spans `GetLengthSid` bytes.
    let bytes = unsafe { core::slice::from_raw_parts(psid.cast::<u8>().cast_const(), len) };
    Sid::from_bytes(bytes).ok()
}

/// Moves the SIDs of an OS-allocated array into `out`, freeing everything.
///
/// # Safety
/// `array` is null or a `LocalAlloc`ed array of `count` `LocalAlloc`ed SIDs.
unsafe fn take_sids(array: *mut PSID, count: u32, out: &mut Vec<Sid>) {
    if array.is_null() {
        return;
    }
    for i in 0..count as usize {
        // SAFETY: `i < count`.
        let psid = unsafe { array.add(i).read() };
        // SAFETY: the OS filled the array with valid SIDs.
        out.extend(unsafe { sid_from_raw(psid) });
        // SAFETY: each SID was allocated with `LocalAlloc`.
        unsafe { LocalFree(psid) };
    }
    // SAFETY: the array was allocated with `LocalAlloc`.
    unsafe { LocalFree(array.cast()) };
}

/// Group and capability SIDs derived from a capability name.
fn derive_capability(derive: DeriveCapabilitySidsFn, name: &str) -> Vec<Sid> {
    let Ok(wide) = U16CString::from_str(name) else {
        return Vec::new();
    };
    let mut groups: *mut PSID = null_mut();
    let mut group_count = 0u32;
    let mut capabilities: *mut PSID = null_mut();
    let mut capability_count = 0u32;
    // SAFETY: all out-pointers are valid; `wide` is NUL-terminated.
    let ok = unsafe {
        derive(
            wide.as_ptr(),
            &raw mut groups,
            &raw mut group_count,
            &raw mut capabilities,
            &raw mut capability_count,
        )
    };
    if ok == 0 {
        trace!(capability = name, "capability derivation failed");
        return Vec::new();
    }
    let mut sids = Vec::new();
    #[expect(
        clippy::multiple_unsafe_ops_per_block,
        reason = "Same operation so same safety doc"
    )]
    // SAFETY: on success both arrays hold the reported number of OS-allocated SIDs.
    unsafe {
        take_sids(groups, group_count, &mut sids);
        take_sids(capabilities, capability_count, &mut sids);
    }
    sids
}

/// `REG_SZ` value `value` under `root\subkey`, without trailing NULs.
fn registry_string(root: HKEY, subkey: &str, value: &str) -> Option<String> {
    let subkey = U16CString::from_str(subkey).ok()?;
    let value = U16CString::from_str(value).ok()?;
    let mut size = 0u32;
    // SAFETY: size probe with a null data pointer.
    let status = unsafe {
        RegGetValueW(
            root,
            subkey.as_ptr(),
            value.as_ptr(),
            RRF_RT_REG_SZ,
            null_mut(),
            null_mut(),
            &raw mut size,
        )
    };
    if status != ERROR_SUCCESS {
        return None;
    }
    let mut data = SmallVec::<[u16; 128]>::from_elem(0, (size as usize).div_ceil(2));
    // SAFETY: `data` holds at least `size` bytes.
    let status = unsafe {
        RegGetValueW(
            root,
            subkey.as_ptr(),
            value.as_ptr(),
            RRF_RT_REG_SZ,
            null_mut(),
            data.as_mut_ptr().cast(),
            &raw mut size,
        )
    };
    if status != ERROR_SUCCESS {
        return None;
    }
    data.truncate(size as usize / 2);
    while data.last() == Some(&0) {
        data.pop();
    }
    (!data.is_empty()).then(|| String::from_utf16_lossy(&data))
}

/// `DOMAIN\Name` through `LookupAccountSidW`.
fn lookup_account(sid: &RawSid) -> Option<DomainAndName> {
    let mut name_len = 0u32;
    let mut domain_len = 0u32;
    let mut sid_type_raw = 0i32;
    // SAFETY: size probe with null buffers.
    let probed = unsafe {
        LookupAccountSidW(
            null(),
            sid.as_psid(),
            null_mut(),
            &raw mut name_len,
            null_mut(),
            &raw mut domain_len,
            &raw mut sid_type_raw,
        )
    };
    // SAFETY: `GetLastError` is always safe to call.
    if probed != 0 || unsafe { GetLastError() } != ERROR_INSUFFICIENT_BUFFER {
        return None;
    }
    loop {
        let mut name = SmallVec::<[u16; 256]>::from_elem(0, name_len as usize);
        let mut domain = SmallVec::<[u16; 256]>::from_elem(0, domain_len as usize);
        // SAFETY: the buffers hold `name_len` and `domain_len` units.
        let ok = unsafe {
            LookupAccountSidW(
                null(),
                sid.as_psid(),
                name.as_mut_ptr(),
                &raw mut name_len,
                domain.as_mut_ptr(),
                &raw mut domain_len,
                &raw mut sid_type_raw,
            )
        };
        if ok == 0 {
            // SAFETY: `GetLastError` is always safe to call.
            if unsafe { GetLastError() } == ERROR_INSUFFICIENT_BUFFER {
                continue;
            }
            return None;
        }
        name.truncate(name_len as usize);
        domain.truncate(domain_len as usize);
        trace!(sid_type = ?SidType::try_from(sid_type_raw).ok(), "account found");
        return Some(DomainAndName::new(
            String::from_utf16_lossy(&domain),
            String::from_utf16_lossy(&name),
        ));
    }
}

/// [`NameLookup`] over the account database, the AppContainer mappings and
/// derived capability SIDs.
#[derive(Debug, Clone, Default)]
pub struct SystemNameLookup {
    capabilities: HashMap<Sid, String>,
    derive: Option<DeriveCapabilitySidsFn>,
    app_containers: Option<AppContainerFns>,
}

impl SystemNameLookup {
    /// Lookup over the entry points `support` found, with capability names
    /// from [`CAPABILITY_NAMES`].
    #[inline]
    #[must_use]
    pub fn new(support: &PlatformSupport) -> Self {
        let entry_points = support.entry_points();
        let lookup = Self {
            capabilities: LEGACY_CAPABILITIES
                .iter()
                .filter_map(|&(rid, name)| {
                    let sid =
                        Sid::try_new(SidIdentifierAuthority::APP_PACKAGE_AUTHORITY, [3, rid])?;
                    Some((sid, name.to_owned()))
                })
                .collect(),
            derive: entry_points.derive_capability_sids,
            app_containers: entry_points.app_container,
        };
        lookup.with_capability_names(CAPABILITY_NAMES.iter().copied())
    }

    /// Adds capability names; a no-op when the OS cannot derive their SIDs.
    #[inline]
    #[must_use]
    pub fn with_capability_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(derive) = self.derive else {
            return self;
        };
        for name in names {
            let name = name.as_ref();
            for sid in derive_capability(derive, name) {
                self.capabilities.entry(sid).or_insert_with(|| name.to_owned());
            }
        }
        debug!(capabilities = self.capabilities.len(), "capability table built");
        self
    }
}

fn is_app_package(sid: &Sid) -> bool {
    sid.identifier_authority() == SidIdentifierAuthority::APP_PACKAGE_AUTHORITY
}

impl NameLookup for SystemNameLookup {
    fn account(&self, sid: &Sid) -> Option<String> {
        lookup_account(&RawSid::new(sid)).map(|account| account.to_string())
    }

    fn package(&self, sid: &Sid) -> Option<String> {
        if !is_app_package(sid) {
            return None;
        }
        if sid.starts_with(SidIdentifierAuthority::APP_PACKAGE_AUTHORITY, &[3, 4096])
            && sid.sub_authorities().len() == 2
        {
            return Some("InternetExplorer".to_owned());
        }
        let mapping = format!("{MAPPINGS}{sid}");
        registry_string(HKEY_CURRENT_USER, &mapping, "Moniker").or_else(|| {
            registry_string(HKEY_USERS, &format!("{DEFAULT_PROFILE}{mapping}"), "Moniker")
        })
    }

    fn app_container(&self, sid: &Sid) -> Option<String> {
        if !is_app_package(sid) {
            return None;
        }
        if let Some(fns) = self.app_containers {
            let raw = RawSid::new(sid);
            let mut moniker: PWSTR = null_mut();
            // SAFETY: `raw` is a valid SID and `moniker` a valid out-pointer.
            let result = unsafe { (fns.lookup)(raw.as_psid(), &raw mut moniker) };
            if result >= 0 && !moniker.is_null() {
                // SAFETY: on success the moniker is a NUL-terminated string.
                let name = unsafe { U16CStr::from_ptr_str(moniker) }.to_string_lossy();
                // SAFETY: allocated by `AppContainerLookupMoniker`.
                unsafe { (fns.free)(moniker.cast()) };
                return Some(name);
            }
        }
        registry_string(
            HKEY_USERS,
            &format!("{DEFAULT_PROFILE}{MAPPINGS}{sid}"),
            "Moniker",
        )
    }

    fn capability(&self, sid: &Sid) -> Option<String> {
        self.capabilities.get(sid).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_points_disable_derivation() {
        let lookup =
            SystemNameLookup::new(&PlatformSupport::NONE).with_capability_names(["webcam"]);
        assert!(lookup.derive.is_none());
        assert!(lookup.app_containers.is_none());
        assert_eq!(lookup.capabilities.len(), LEGACY_CAPABILITIES.len());
        let client: Sid = "S-1-15-3-1".parse().unwrap();
        assert_eq!(lookup.capability(&client).as_deref(), Some("internetClient"));
    }

    #[test]
    fn detected_entry_points_are_used() {
        let support = PlatformSupport::detect();
        let lookup = SystemNameLookup::new(&support);
        assert_eq!(lookup.derive.is_some(), support.capability_derivation());
        assert_eq!(
            lookup.app_containers.is_some(),
            support.app_container_monikers()
        );
    }
}
