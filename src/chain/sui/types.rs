//! BCS layout of Sui `TransactionData` for programmable transactions.
//!
//! Variant order matters: serde encodes enum variants by declaration index, which
//! must match the on-chain layout. Only the programmable transaction kind is
//! modelled; any other kind fails to decode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use super::{ObjectId, SuiAddress};

// ============================================================================
// Objects
// ============================================================================

/// 32-byte object digest, base58 in JSON and length-prefixed bytes in BCS.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ObjectDigest(pub [u8; 32]);

impl Display for ObjectDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl std::str::FromStr for ObjectDigest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| format!("invalid base58 digest: {e}"))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("digest must be 32 bytes, got {}", v.len()))?;
        Ok(Self(digest))
    }
}

impl Serialize for ObjectDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for ObjectDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            let digest: [u8; 32] = bytes
                .try_into()
                .map_err(|_| serde::de::Error::custom("digest must be 32 bytes"))?;
            Ok(Self(digest))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
}

// ============================================================================
// Transaction data
// ============================================================================

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: SuiAddress,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: SuiAddress,
    pub price: u64,
    pub budget: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallArg {
    /// BCS bytes of a pure value.
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
    Receiving(ObjectRef),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StructTag {
    pub address: SuiAddress,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl TransactionData {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bcs::Error> {
        bcs::from_bytes(bytes)
    }

    pub fn v1(&self) -> &TransactionDataV1 {
        match self {
            TransactionData::V1(v1) => v1,
        }
    }

    pub fn sender(&self) -> SuiAddress {
        self.v1().sender
    }

    pub fn gas_owner(&self) -> SuiAddress {
        self.v1().gas_data.owner
    }

    pub fn programmable(&self) -> &ProgrammableTransaction {
        match &self.v1().kind {
            TransactionKind::ProgrammableTransaction(ptb) => ptb,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates inputs and commands of a programmable transaction.
#[derive(Debug, Default)]
pub struct ProgrammableTransactionBuilder {
    inner: ProgrammableTransaction,
}

impl ProgrammableTransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a BCS-encoded pure input.
    pub fn pure<T: Serialize>(&mut self, value: &T) -> Result<Argument, bcs::Error> {
        let bytes = bcs::to_bytes(value)?;
        Ok(self.input(CallArg::Pure(bytes)))
    }

    pub fn object(&mut self, object: ObjectRef) -> Argument {
        self.input(CallArg::Object(ObjectArg::ImmOrOwnedObject(object)))
    }

    fn input(&mut self, arg: CallArg) -> Argument {
        let index = self.inner.inputs.len() as u16;
        self.inner.inputs.push(arg);
        Argument::Input(index)
    }

    /// Appends a command and returns its result argument.
    pub fn command(&mut self, command: Command) -> Argument {
        let index = self.inner.commands.len() as u16;
        self.inner.commands.push(command);
        Argument::Result(index)
    }

    /// `SplitCoins(coin, [amount])` followed by `TransferObjects([split], recipient)`.
    pub fn pay(
        &mut self,
        coin: Argument,
        recipient: SuiAddress,
        amount: u64,
    ) -> Result<(), bcs::Error> {
        let amount = self.pure(&amount)?;
        let split_index = self.inner.commands.len() as u16;
        self.command(Command::SplitCoins(coin, vec![amount]));
        let recipient = self.pure(&recipient)?;
        self.command(Command::TransferObjects(
            vec![Argument::NestedResult(split_index, 0)],
            recipient,
        ));
        Ok(())
    }

    pub fn finish(self) -> ProgrammableTransaction {
        self.inner
    }
}

// ============================================================================
// Transfer analysis
// ============================================================================

/// Where a transferred coin was split from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoinSource {
    GasCoin,
    Object(ObjectRef),
}

/// A coin split and transferred to a recipient inside a programmable transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoinTransfer {
    pub recipient: SuiAddress,
    pub amount: u64,
    pub source: CoinSource,
}

impl ProgrammableTransaction {
    fn pure_input<T: serde::de::DeserializeOwned>(&self, arg: &Argument) -> Option<T> {
        match arg {
            Argument::Input(i) => match self.inputs.get(*i as usize)? {
                CallArg::Pure(bytes) => bcs::from_bytes(bytes).ok(),
                CallArg::Object(_) => None,
            },
            _ => None,
        }
    }

    fn coin_source(&self, arg: &Argument) -> Option<CoinSource> {
        match arg {
            Argument::GasCoin => Some(CoinSource::GasCoin),
            Argument::Input(i) => match self.inputs.get(*i as usize)? {
                CallArg::Object(ObjectArg::ImmOrOwnedObject(object)) => {
                    Some(CoinSource::Object(*object))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Resolves a transferred argument back to the `SplitCoins` amount behind it.
    fn split_amount(&self, arg: &Argument) -> Option<(u64, CoinSource)> {
        let (command_index, result_index) = match arg {
            Argument::NestedResult(c, r) => (*c, *r),
            Argument::Result(c) => (*c, 0),
            _ => return None,
        };
        match self.commands.get(command_index as usize)? {
            Command::SplitCoins(coin, amounts) => {
                let amount = self.pure_input::<u64>(amounts.get(result_index as usize)?)?;
                Some((amount, self.coin_source(coin)?))
            }
            _ => None,
        }
    }

    /// Every split-and-transfer pattern whose recipient and amount can be resolved.
    pub fn coin_transfers(&self) -> Vec<CoinTransfer> {
        let mut transfers = Vec::new();
        for command in &self.commands {
            let Command::TransferObjects(objects, recipient) = command else {
                continue;
            };
            let Some(recipient) = self.pure_input::<SuiAddress>(recipient) else {
                continue;
            };
            for object in objects {
                if let Some((amount, source)) = self.split_amount(object) {
                    transfers.push(CoinTransfer {
                        recipient,
                        amount,
                        source,
                    });
                }
            }
        }
        transfers
    }

    /// Total amount transferred to each recipient.
    pub fn amounts_by_recipient(&self) -> BTreeMap<SuiAddress, u128> {
        let mut totals = BTreeMap::new();
        for transfer in self.coin_transfers() {
            *totals.entry(transfer.recipient).or_insert(0u128) += u128::from(transfer.amount);
        }
        totals
    }
}
