// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2.
//
// App information comes from the main bundle's Info.plist; runtime resources
// are Info.plist keys written by the build tooling (`MxRuntimeUrl`,
// `MxNativeDependencies`, `MxCookieEncryption`). Secrets go to the keychain
// as generic passwords.

#![cfg(target_os = "ios")]

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::PathBuf;

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, Bool};
use objc2::msg_send;
use objc2_foundation::{
    NSBundle, NSData, NSDictionary, NSSearchPathDirectory, NSSearchPathDomainMask,
    NSSearchPathForDirectoriesInDomains, NSString,
};

use mxnative_core::error::{MxNativeError, Result};

use crate::traits::*;

// ---------------------------------------------------------------------------
// Security.framework FFI (keychain)
// ---------------------------------------------------------------------------
// NSDictionary and CFDictionary are toll-free bridged, so we cast freely
// between them.

const ERR_SEC_SUCCESS: i32 = 0;
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;
const ERR_SEC_DUPLICATE_ITEM: i32 = -25299;

unsafe extern "C" {
    fn SecItemAdd(attributes: *const c_void, result: *mut *const c_void) -> i32;
    fn SecItemCopyMatching(query: *const c_void, result: *mut *const c_void) -> i32;
    fn SecItemUpdate(query: *const c_void, attrs_to_update: *const c_void) -> i32;
    fn SecItemDelete(query: *const c_void) -> i32;
}

// `CFStringRef` globals, toll-free bridged with `NSString *`.
unsafe extern "C" {
    static kSecClass: &'static NSString;
    static kSecClassGenericPassword: &'static NSString;
    static kSecAttrAccount: &'static NSString;
    static kSecAttrService: &'static NSString;
    static kSecValueData: &'static NSString;
    static kSecReturnData: &'static NSString;
    static kSecMatchLimit: &'static NSString;
    static kSecMatchLimitOne: &'static NSString;
}

/// Keychain service shared by all mxnative secrets.
const KEYCHAIN_SERVICE: &str = "io.mxnative.secrets";

const BUNDLE_FILE_NAME: &str = "index.ios.bundle";
const OTA_DIR_NAME: &str = "Ota";

const KEY_SHORT_VERSION: &str = "CFBundleShortVersionString";
const KEY_BUILD_VERSION: &str = "CFBundleVersion";
const KEY_RUNTIME_URL: &str = "MxRuntimeUrl";
const KEY_NATIVE_DEPENDENCIES: &str = "MxNativeDependencies";
const KEY_COOKIE_ENCRYPTION: &str = "MxCookieEncryption";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dict_as_cf(dict: &NSDictionary<NSString, AnyObject>) -> *const c_void {
    dict as *const NSDictionary<NSString, AnyObject> as *const c_void
}

/// SAFETY: NSString is an NSObject subclass; same pointer, same layout.
unsafe fn nsstr_as_obj(s: &NSString) -> &AnyObject {
    unsafe { &*(s as *const NSString as *const AnyObject) }
}

/// SAFETY: NSData is an NSObject subclass; same pointer, same layout.
unsafe fn nsdata_as_obj(d: &NSData) -> &AnyObject {
    unsafe { &*(d as *const NSData as *const AnyObject) }
}

/// Raw Info.plist value for `key`.
fn info_value(key: &str) -> Option<Retained<AnyObject>> {
    let info = NSBundle::mainBundle().infoDictionary()?;
    let ns_key = NSString::from_str(key);
    // SAFETY: `objectForKey:` on an NSDictionary returns an autoreleased
    // object or nil.
    unsafe { msg_send![&*info, objectForKey: &*ns_key] }
}

/// Info.plist string value. Non-string values read as `None`.
fn info_string(key: &str) -> Option<String> {
    let value = info_value(key)?;
    // SAFETY: class check before treating the object as an NSString.
    let is_string: Bool =
        unsafe { msg_send![&*value, isKindOfClass: objc2::class!(NSString)] };
    if !is_string.as_bool() {
        return None;
    }
    // SAFETY: checked above.
    let string: &NSString = unsafe { &*(&*value as *const AnyObject as *const NSString) };
    Some(string.to_string())
}

/// First user-domain path for a Foundation search directory.
fn search_path(directory: NSSearchPathDirectory) -> Result<PathBuf> {
    let paths = NSSearchPathForDirectoriesInDomains(
        directory,
        NSSearchPathDomainMask::UserDomainMask,
        true,
    );
    paths
        .firstObject()
        .map(|path| PathBuf::from(path.to_string()))
        .ok_or_else(|| MxNativeError::Bridge(format!("no path for {directory:?}")))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// iOS implementation of the platform bridge.
pub struct IosBridge;

impl IosBridge {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IosBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }
}

// ---------------------------------------------------------------------------
// NativeAppInfo -- NSBundle / search paths
// ---------------------------------------------------------------------------

impl NativeAppInfo for IosBridge {
    /// `CFBundleShortVersionString-CFBundleVersion`.
    fn app_version(&self) -> Result<String> {
        let short = info_string(KEY_SHORT_VERSION).unwrap_or_default();
        let build = info_string(KEY_BUILD_VERSION).unwrap_or_default();
        Ok(format!("{short}-{build}"))
    }

    fn app_identifier(&self) -> Result<String> {
        NSBundle::mainBundle()
            .bundleIdentifier()
            .map(|id| id.to_string())
            .ok_or_else(|| MxNativeError::Bridge("main bundle has no identifier".into()))
    }

    fn documents_dir(&self) -> Result<PathBuf> {
        search_path(NSSearchPathDirectory::DocumentDirectory)
    }

    fn cache_dir(&self) -> Result<PathBuf> {
        search_path(NSSearchPathDirectory::CachesDirectory)
    }

    /// `<Application Support>/<bundle id>/Ota`, excluded from the
    /// documents directory the JS file module sees.
    fn ota_dir(&self) -> Result<PathBuf> {
        let support = search_path(NSSearchPathDirectory::ApplicationSupportDirectory)?;
        Ok(support.join(self.app_identifier()?).join(OTA_DIR_NAME))
    }

    fn bundle_file_name(&self) -> &str {
        BUNDLE_FILE_NAME
    }
}

// ---------------------------------------------------------------------------
// NativeKeychain -- Security.framework
// ---------------------------------------------------------------------------

impl NativeKeychain for IosBridge {
    /// Store `value` under `key`, updating in place if it already exists.
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        tracing::info!(key, "iOS: storing secret in Keychain");

        let ns_key = NSString::from_str(key);
        let ns_service = NSString::from_str(KEYCHAIN_SERVICE);
        let ns_data = NSData::with_bytes(value);

        // SAFETY: Security.framework constants, valid for the process lifetime.
        let keys: Vec<&NSString> =
            unsafe { vec![kSecClass, kSecAttrAccount, kSecAttrService, kSecValueData] };
        // SAFETY: toll-free bridge casts.
        let values: Vec<&AnyObject> = unsafe {
            vec![
                nsstr_as_obj(kSecClassGenericPassword),
                nsstr_as_obj(&ns_key),
                nsstr_as_obj(&ns_service),
                nsdata_as_obj(&ns_data),
            ]
        };
        let dict = NSDictionary::from_slices(&keys, &values);

        // SAFETY: C call with a toll-free bridged dictionary.
        let status = unsafe { SecItemAdd(dict_as_cf(&dict), std::ptr::null_mut()) };
        match status {
            ERR_SEC_SUCCESS => Ok(()),
            ERR_SEC_DUPLICATE_ITEM => self.update_secret(key, value),
            code => Err(MxNativeError::Bridge(format!(
                "SecItemAdd failed with OSStatus {code}"
            ))),
        }
    }

    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        tracing::debug!(key, "iOS: loading secret from Keychain");

        let ns_key = NSString::from_str(key);
        let ns_service = NSString::from_str(KEYCHAIN_SERVICE);

        // kSecReturnData expects a CFBoolean, toll-free bridged with NSNumber.
        // SAFETY: NSNumber class method returning a retained object.
        let cf_true: Retained<AnyObject> =
            unsafe { msg_send![objc2::class!(NSNumber), numberWithBool: Bool::YES] };

        // SAFETY: Security.framework constants.
        let keys: Vec<&NSString> = unsafe {
            vec![
                kSecClass,
                kSecAttrAccount,
                kSecAttrService,
                kSecReturnData,
                kSecMatchLimit,
            ]
        };
        // SAFETY: toll-free bridge casts.
        let values: Vec<&AnyObject> = unsafe {
            vec![
                nsstr_as_obj(kSecClassGenericPassword),
                nsstr_as_obj(&ns_key),
                nsstr_as_obj(&ns_service),
                &*cf_true,
                nsstr_as_obj(kSecMatchLimitOne),
            ]
        };
        let dict = NSDictionary::from_slices(&keys, &values);

        let mut result: *const c_void = std::ptr::null();
        // SAFETY: on success `result` receives a +1 retained CFData.
        let status = unsafe { SecItemCopyMatching(dict_as_cf(&dict), &mut result) };

        match status {
            ERR_SEC_SUCCESS => {
                if result.is_null() {
                    return Ok(None);
                }
                // SAFETY: CFData and NSData are toll-free bridged.
                let ns_data: &NSData = unsafe { &*(result as *const NSData) };
                let bytes = ns_data.to_vec();
                // SAFETY: balance the +1 retain from SecItemCopyMatching.
                unsafe {
                    let _: () = msg_send![result as *const AnyObject, release];
                }
                Ok(Some(bytes))
            }
            ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            code => Err(MxNativeError::Bridge(format!(
                "SecItemCopyMatching failed with OSStatus {code}"
            ))),
        }
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        tracing::info!(key, "iOS: deleting secret from Keychain");

        let dict = secret_query(key);
        // SAFETY: C call with a toll-free bridged dictionary.
        let status = unsafe { SecItemDelete(dict_as_cf(&dict)) };
        match status {
            ERR_SEC_SUCCESS | ERR_SEC_ITEM_NOT_FOUND => Ok(()),
            code => Err(MxNativeError::Bridge(format!(
                "SecItemDelete failed with OSStatus {code}"
            ))),
        }
    }
}

impl IosBridge {
    fn update_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let query = secret_query(key);
        let ns_data = NSData::with_bytes(value);

        // SAFETY: Security.framework constant.
        let update_keys: Vec<&NSString> = unsafe { vec![kSecValueData] };
        // SAFETY: toll-free bridge cast.
        let update_values: Vec<&AnyObject> = unsafe { vec![nsdata_as_obj(&ns_data)] };
        let update = NSDictionary::from_slices(&update_keys, &update_values);

        // SAFETY: C call with toll-free bridged dictionaries.
        let status = unsafe { SecItemUpdate(dict_as_cf(&query), dict_as_cf(&update)) };
        if status == ERR_SEC_SUCCESS {
            Ok(())
        } else {
            Err(MxNativeError::Bridge(format!(
                "SecItemUpdate failed with OSStatus {status}"
            )))
        }
    }
}

/// Query identifying one generic-password item of this app.
fn secret_query(key: &str) -> Retained<NSDictionary<NSString, AnyObject>> {
    let ns_key = NSString::from_str(key);
    let ns_service = NSString::from_str(KEYCHAIN_SERVICE);
    // SAFETY: Security.framework constants.
    let keys: Vec<&NSString> = unsafe { vec![kSecClass, kSecAttrAccount, kSecAttrService] };
    // SAFETY: toll-free bridge casts.
    let values: Vec<&AnyObject> = unsafe {
        vec![
            nsstr_as_obj(kSecClassGenericPassword),
            nsstr_as_obj(&ns_key),
            nsstr_as_obj(&ns_service),
        ]
    };
    NSDictionary::from_slices(&keys, &values)
}

// ---------------------------------------------------------------------------
// NativeRuntimeResources -- Info.plist
// ---------------------------------------------------------------------------

impl NativeRuntimeResources for IosBridge {
    fn runtime_url(&self) -> Result<Option<String>> {
        Ok(info_string(KEY_RUNTIME_URL).filter(|url| !url.trim().is_empty()))
    }

    fn native_dependencies(&self) -> Result<BTreeMap<String, String>> {
        match info_string(KEY_NATIVE_DEPENDENCIES) {
            Some(raw) => parse_native_dependencies(&raw),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Accepts a plist boolean or a "YES"/"true" string.
    fn cookie_encryption_enabled(&self) -> Result<bool> {
        let Some(value) = info_value(KEY_COOKIE_ENCRYPTION) else {
            return Ok(false);
        };
        // SAFETY: both NSNumber and NSString respond to boolValue.
        let enabled: Bool = unsafe { msg_send![&*value, boolValue] };
        Ok(enabled.as_bool())
    }
}
