use concent_types::{
    ConcentError, Envelope, MessageBody, PublicKey, ReportComputedTask, Result, Signature,
    TaskToCompute,
};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

pub const SIGNATURE_LENGTH: usize = 64;

/// A keypair for signing and verification
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());

        Self {
            signing_key,
            public_key,
        }
    }

    /// Create a keypair from bytes (32 bytes for private key)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ConcentError::InvalidMessage(
                "Invalid key length".to_string(),
            ));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(bytes);

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());

        Ok(Self {
            signing_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Secret key bytes, for writing to a key file.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign arbitrary bytes
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::new(signature.to_bytes().to_vec())
    }
}

/// Verify a signature over `message` against `public_key`.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<()> {
    if signature.as_bytes().len() != SIGNATURE_LENGTH {
        return Err(ConcentError::SignatureVerification);
    }

    let verifying_key = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| ConcentError::SignatureVerification)?;

    let sig_array: [u8; SIGNATURE_LENGTH] = signature
        .as_bytes()
        .try_into()
        .map_err(|_| ConcentError::SignatureVerification)?;
    let signature = DalekSignature::from_bytes(&sig_array);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| ConcentError::SignatureVerification)
}

/// Build a signed envelope around `body`.
pub fn sign_envelope(keypair: &Keypair, timestamp: i64, body: MessageBody) -> Envelope {
    let mut envelope = Envelope::new(timestamp, body);
    envelope.signature = keypair.sign(&envelope.signable_bytes());
    envelope
}

/// Verify an envelope signature against the given key.
pub fn verify_envelope(envelope: &Envelope, public_key: &PublicKey) -> Result<()> {
    verify_signature(public_key, &envelope.signable_bytes(), &envelope.signature)
}

/// Sign a task assignment with the requestor key.
pub fn sign_task_to_compute(keypair: &Keypair, task_to_compute: &mut TaskToCompute) {
    task_to_compute.signature = keypair.sign(&task_to_compute.signable_bytes());
}

/// Verify the embedded requestor signature of a task assignment.
pub fn verify_task_to_compute(task_to_compute: &TaskToCompute) -> Result<()> {
    verify_signature(
        &task_to_compute.requestor_public_key,
        &task_to_compute.signable_bytes(),
        &task_to_compute.signature,
    )
}

/// Sign a computation report with the provider key.
pub fn sign_report_computed_task(keypair: &Keypair, report: &mut ReportComputedTask) {
    report.signature = keypair.sign(&report.signable_bytes());
}

/// Verify the embedded provider signature of a computation report.
pub fn verify_report_computed_task(report: &ReportComputedTask) -> Result<()> {
    verify_signature(
        &report.task_to_compute.provider_public_key,
        &report.signable_bytes(),
        &report.signature,
    )
}
