//! Message codes.
//!
//! Every frame carries a single code byte that names its payload type. The
//! table below is the full set the client understands; any other byte on the
//! wire is rejected.

use crate::error::ProtocolError;
use std::fmt;

macro_rules! message_codes {
    ($($variant:ident = $value:literal => $name:literal),* $(,)?) => {
        /// A known request or response kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum MessageCode {
            $($variant = $value),*
        }

        impl MessageCode {
            /// Every known code, in wire order.
            pub const ALL: &'static [MessageCode] = &[$(MessageCode::$variant),*];

            /// Wire name of the message type, e.g. `RpbPingReq`.
            pub fn name(self) -> &'static str {
                match self {
                    $(MessageCode::$variant => $name),*
                }
            }
        }

        impl TryFrom<u8> for MessageCode {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(MessageCode::$variant),)*
                    other => Err(ProtocolError::UnknownMessageCode(other)),
                }
            }
        }
    };
}

message_codes! {
    ErrorResp = 0 => "RpbErrorResp",
    PingReq = 1 => "RpbPingReq",
    PingResp = 2 => "RpbPingResp",
    GetClientIdReq = 3 => "RpbGetClientIdReq",
    GetClientIdResp = 4 => "RpbGetClientIdResp",
    SetClientIdReq = 5 => "RpbSetClientIdReq",
    SetClientIdResp = 6 => "RpbSetClientIdResp",
    GetServerInfoReq = 7 => "RpbGetServerInfoReq",
    GetServerInfoResp = 8 => "RpbGetServerInfoResp",
    GetReq = 9 => "RpbGetReq",
    GetResp = 10 => "RpbGetResp",
    PutReq = 11 => "RpbPutReq",
    PutResp = 12 => "RpbPutResp",
    DelReq = 13 => "RpbDelReq",
    DelResp = 14 => "RpbDelResp",
    ListBucketsReq = 15 => "RpbListBucketsReq",
    ListBucketsResp = 16 => "RpbListBucketsResp",
    ListKeysReq = 17 => "RpbListKeysReq",
    ListKeysResp = 18 => "RpbListKeysResp",
    GetBucketReq = 19 => "RpbGetBucketReq",
    GetBucketResp = 20 => "RpbGetBucketResp",
    SetBucketReq = 21 => "RpbSetBucketReq",
    SetBucketResp = 22 => "RpbSetBucketResp",
    MapRedReq = 23 => "RpbMapRedReq",
    MapRedResp = 24 => "RpbMapRedResp",
    IndexReq = 25 => "RpbIndexReq",
    IndexResp = 26 => "RpbIndexResp",
    SearchQueryReq = 27 => "RpbSearchQueryReq",
    SearchQueryResp = 28 => "RpbSearchQueryResp",
    ResetBucketReq = 29 => "RpbResetBucketReq",
    ResetBucketResp = 30 => "RpbResetBucketResp",
    GetBucketTypeReq = 31 => "RpbGetBucketTypeReq",
    SetBucketTypeReq = 32 => "RpbSetBucketTypeReq",
    GetBucketKeyPreflistReq = 33 => "RpbGetBucketKeyPreflistReq",
    GetBucketKeyPreflistResp = 34 => "RpbGetBucketKeyPreflistResp",
    CsBucketReq = 40 => "RpbCSBucketReq",
    CsBucketResp = 41 => "RpbCSBucketResp",
    IndexBodyResp = 42 => "RpbIndexBodyResp",
    CounterUpdateReq = 50 => "RpbCounterUpdateReq",
    CounterUpdateResp = 51 => "RpbCounterUpdateResp",
    CounterGetReq = 52 => "RpbCounterGetReq",
    CounterGetResp = 53 => "RpbCounterGetResp",
    YokozunaIndexGetReq = 54 => "RpbYokozunaIndexGetReq",
    YokozunaIndexGetResp = 55 => "RpbYokozunaIndexGetResp",
    YokozunaIndexPutReq = 56 => "RpbYokozunaIndexPutReq",
    YokozunaIndexDeleteReq = 57 => "RpbYokozunaIndexDeleteReq",
    YokozunaSchemaGetReq = 58 => "RpbYokozunaSchemaGetReq",
    YokozunaSchemaGetResp = 59 => "RpbYokozunaSchemaGetResp",
    YokozunaSchemaPutReq = 60 => "RpbYokozunaSchemaPutReq",
    CoverageReq = 70 => "RpbCoverageReq",
    CoverageResp = 71 => "RpbCoverageResp",
    DtFetchReq = 80 => "DtFetchReq",
    DtFetchResp = 81 => "DtFetchResp",
    DtUpdateReq = 82 => "DtUpdateReq",
    DtUpdateResp = 83 => "DtUpdateResp",
    TsQueryReq = 90 => "TsQueryReq",
    TsQueryResp = 91 => "TsQueryResp",
    TsPutReq = 92 => "TsPutReq",
    TsPutResp = 93 => "TsPutResp",
    TsDelReq = 94 => "TsDelReq",
    TsDelResp = 95 => "TsDelResp",
    TsGetReq = 96 => "TsGetReq",
    TsGetResp = 97 => "TsGetResp",
    TsListKeysReq = 98 => "TsListKeysReq",
    TsListKeysResp = 99 => "TsListKeysResp",
    TsCoverageReq = 100 => "TsCoverageReq",
    TsCoverageResp = 101 => "TsCoverageResp",
    TsCoverageEntry = 102 => "TsCoverageEntry",
    TsRange = 103 => "TsRange",
    TsTtbMsg = 104 => "TsTtbMsg",
    AuthReq = 253 => "RpbAuthReq",
    AuthResp = 254 => "RpbAuthResp",
    StartTls = 255 => "RpbStartTls",
}

impl MessageCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<MessageCode> for u8 {
    fn from(code: MessageCode) -> u8 {
        code as u8
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_table_is_bijective() {
        let mut seen = HashSet::new();
        for code in MessageCode::ALL {
            assert!(seen.insert(code.as_u8()), "duplicate code {}", code);
            assert_eq!(MessageCode::try_from(code.as_u8()).unwrap(), *code);
        }
        assert_eq!(seen.len(), MessageCode::ALL.len());
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for value in [35u8, 43, 61, 72, 84, 105, 200, 252] {
            assert!(matches!(
                MessageCode::try_from(value),
                Err(ProtocolError::UnknownMessageCode(v)) if v == value
            ));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageCode::ErrorResp.to_string(), "RpbErrorResp(0)");
        assert_eq!(MessageCode::TsTtbMsg.to_string(), "TsTtbMsg(104)");
        assert_eq!(MessageCode::StartTls.to_string(), "RpbStartTls(255)");
    }
}
