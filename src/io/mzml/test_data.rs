//! In-memory mzML documents for tests, with byte offsets computed while the
//! document is written.
use std::io::{Cursor, Write};

use base64_simd::STANDARD;
use flate2::{write::ZlibEncoder, Compression};

pub(crate) const FIXTURE_CHECKSUM: &str = "5c1f7b2a3e9d0c4f8a6b1e2d3c4b5a6f7e8d9c0b";

fn encode_bytes(bytes: &[u8], compressed: bool) -> String {
    if compressed {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        STANDARD.encode_to_string(encoder.finish().unwrap())
    } else {
        STANDARD.encode_to_string(bytes)
    }
}

pub(crate) fn encode_f64(values: &[f64], compressed: bool) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_bytes(&bytes, compressed)
}

pub(crate) fn encode_f32(values: &[f32], compressed: bool) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_bytes(&bytes, compressed)
}

/// What to write after the `</mzML>` close tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trailer {
    /// A well formed `<indexList>` and a correct `<indexListOffset>`
    Indexed,
    /// An `<indexList>` whose stated offset lies past the end of the document
    PastEnd,
    /// An `<indexList>` whose stated offset is a bogus small value
    BelowMinimum,
    /// A plain `<mzML>` document without an index
    Absent,
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureSpectrum {
    pub id: String,
    pub ms_level: u8,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureChromatogram {
    pub id: String,
    pub time: Vec<f64>,
    pub intensity: Vec<f32>,
}

/// A generated document and the offsets a correct index would record
#[derive(Debug, Clone)]
pub(crate) struct Fixture {
    pub bytes: Vec<u8>,
    pub spectrum_offsets: Vec<(String, u64)>,
    pub chromatogram_offsets: Vec<(String, u64)>,
    pub index_list_offset: Option<u64>,
}

impl Fixture {
    pub fn cursor(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureBuilder {
    spectra: Vec<FixtureSpectrum>,
    chromatograms: Vec<FixtureChromatogram>,
    compressed: bool,
    type_as_key: bool,
    reverse_index: bool,
    trailer: Trailer,
    corrupt: Vec<String>,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self {
            spectra: Vec::new(),
            chromatograms: Vec::new(),
            compressed: true,
            type_as_key: false,
            reverse_index: false,
            trailer: Trailer::Indexed,
            corrupt: Vec::new(),
        }
    }
}

const MZML_HEADER: &str = r#"<mzML xmlns="http://psi.hupo.org/ms/mzml" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.0.xsd" id="fixture" version="1.1.0">
    <cvList count="2">
      <cv id="MS" fullName="Proteomics Standards Initiative Mass Spectrometry Ontology" version="4.1.30" URI="https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo"/>
      <cv id="UO" fullName="Unit Ontology" version="09:04:2014" URI="https://raw.githubusercontent.com/bio-ontology-research-group/unit-ontology/master/unit.obo"/>
    </cvList>
    <fileDescription>
      <fileContent>
        <cvParam cvRef="MS" accession="MS:1000579" name="MS1 spectrum" value=""/>
        <cvParam cvRef="MS" accession="MS:1000580" name="MSn spectrum" value=""/>
      </fileContent>
      <sourceFileList count="1">
        <sourceFile id="RAW1" name="fixture.raw" location="file:///data">
          <cvParam cvRef="MS" accession="MS:1000768" name="Thermo nativeID format" value=""/>
          <cvParam cvRef="MS" accession="MS:1000563" name="Thermo RAW format" value=""/>
        </sourceFile>
      </sourceFileList>
    </fileDescription>
    <softwareList count="1">
      <software id="pwiz" version="3.0.20066">
        <cvParam cvRef="MS" accession="MS:1000615" name="ProteoWizard software" value=""/>
      </software>
    </softwareList>
    <instrumentConfigurationList count="1">
      <instrumentConfiguration id="IC1">
        <cvParam cvRef="MS" accession="MS:1000483" name="Thermo Fisher Scientific instrument model" value=""/>
        <componentList count="3">
          <source order="1">
            <cvParam cvRef="MS" accession="MS:1000073" name="electrospray ionization" value=""/>
          </source>
          <analyzer order="2">
            <cvParam cvRef="MS" accession="MS:1000484" name="orbitrap" value=""/>
          </analyzer>
          <detector order="3">
            <cvParam cvRef="MS" accession="MS:1000624" name="inductive detector" value=""/>
          </detector>
        </componentList>
      </instrumentConfiguration>
    </instrumentConfigurationList>
    <dataProcessingList count="1">
      <dataProcessing id="pwiz_Reader_conversion">
        <processingMethod order="0" softwareRef="pwiz">
          <cvParam cvRef="MS" accession="MS:1000544" name="Conversion to mzML" value=""/>
        </processingMethod>
      </dataProcessing>
    </dataProcessingList>
    <run id="fixture_run" defaultInstrumentConfigurationRef="IC1" defaultSourceFileRef="RAW1">
"#;

fn cv_param(doc: &mut String, depth: usize, accession: &str, name: &str, value: &str) {
    doc.push_str(&format!(
        "{:depth$}<cvParam cvRef=\"MS\" accession=\"{accession}\" name=\"{name}\" value=\"{value}\"/>\n",
        ""
    ));
}

fn cv_param_with_unit(
    doc: &mut String,
    depth: usize,
    accession: &str,
    name: &str,
    value: &str,
    unit: (&str, &str),
) {
    let (unit_accession, unit_name) = unit;
    doc.push_str(&format!(
        "{:depth$}<cvParam cvRef=\"MS\" accession=\"{accession}\" name=\"{name}\" value=\"{value}\" unitCvRef=\"UO\" unitAccession=\"{unit_accession}\" unitName=\"{unit_name}\"/>\n",
        ""
    ));
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two spectra, `scan=1` (MS1, three points) and `scan=2` (MS2, two points)
    pub fn two_spectra() -> Self {
        Self::new()
            .spectrum("scan=1", 1, vec![100.0, 200.5, 300.25], vec![10.0, 20.0, 30.0])
            .spectrum("scan=2", 2, vec![150.5, 250.75], vec![5.0, 7.5])
    }

    pub fn spectrum(mut self, id: &str, ms_level: u8, mz: Vec<f64>, intensity: Vec<f32>) -> Self {
        self.spectra.push(FixtureSpectrum {
            id: id.to_string(),
            ms_level,
            mz,
            intensity,
        });
        self
    }

    pub fn chromatogram(mut self, id: &str, time: Vec<f64>, intensity: Vec<f32>) -> Self {
        self.chromatograms.push(FixtureChromatogram {
            id: id.to_string(),
            time,
            intensity,
        });
        self
    }

    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// State the array type and compression as valued params, which become
    /// record keys, instead of valueless ones
    pub fn type_as_key(mut self, type_as_key: bool) -> Self {
        self.type_as_key = type_as_key;
        self
    }

    /// List index entries in reverse document order
    pub fn reverse_index(mut self, reverse_index: bool) -> Self {
        self.reverse_index = reverse_index;
        self
    }

    pub fn trailer(mut self, trailer: Trailer) -> Self {
        self.trailer = trailer;
        self
    }

    /// Write a payload for `id`'s m/z array whose length does not fit its type
    pub fn corrupt(mut self, id: &str) -> Self {
        self.corrupt.push(id.to_string());
        self
    }

    fn write_array(&self, doc: &mut String, dtype: &str, name: &str, accession: &str, payload: String) {
        let flag = if self.type_as_key { "true" } else { "" };
        doc.push_str(&format!(
            "          <binaryDataArray encodedLength=\"{}\">\n",
            payload.len()
        ));
        let type_accession = if dtype == "32-bit float" {
            "MS:1000521"
        } else {
            "MS:1000523"
        };
        cv_param(doc, 12, type_accession, dtype, flag);
        if self.compressed {
            cv_param(doc, 12, "MS:1000574", "zlib compression", flag);
        } else {
            cv_param(doc, 12, "MS:1000576", "no compression", flag);
        }
        cv_param(doc, 12, accession, name, "");
        doc.push_str(&format!("            <binary>{payload}</binary>\n"));
        doc.push_str("          </binaryDataArray>\n");
    }

    fn write_spectrum(&self, doc: &mut String, index: usize, spectrum: &FixtureSpectrum) {
        doc.push_str(&format!(
            "<spectrum index=\"{index}\" id=\"{}\" defaultArrayLength=\"{}\">\n",
            spectrum.id,
            spectrum.mz.len()
        ));
        cv_param(doc, 8, "MS:1000511", "ms level", &spectrum.ms_level.to_string());
        if spectrum.ms_level == 1 {
            cv_param(doc, 8, "MS:1000579", "MS1 spectrum", "");
        } else {
            cv_param(doc, 8, "MS:1000580", "MSn spectrum", "");
        }
        cv_param(doc, 8, "MS:1000127", "centroid spectrum", "");
        doc.push_str("        <scanList count=\"1\">\n");
        cv_param(doc, 10, "MS:1000795", "no combination", "");
        doc.push_str("          <scan instrumentConfigurationRef=\"IC1\">\n");
        cv_param_with_unit(
            doc,
            12,
            "MS:1000016",
            "scan start time",
            &format!("{:.3}", 0.5 * (index + 1) as f64),
            ("UO:0000031", "minute"),
        );
        doc.push_str("          </scan>\n");
        doc.push_str("        </scanList>\n");
        if spectrum.ms_level > 1 {
            doc.push_str("        <precursorList count=\"1\">\n");
            doc.push_str("          <precursor>\n");
            doc.push_str("            <selectedIonList count=\"1\">\n");
            doc.push_str("              <selectedIon>\n");
            cv_param(doc, 16, "MS:1000744", "selected ion m/z", "445.34");
            doc.push_str("              </selectedIon>\n");
            doc.push_str("            </selectedIonList>\n");
            doc.push_str("          </precursor>\n");
            doc.push_str("        </precursorList>\n");
        }
        doc.push_str("        <binaryDataArrayList count=\"2\">\n");
        let mz_payload = if self.corrupt.contains(&spectrum.id) {
            encode_f32(&[1.0, 2.0, 3.0], self.compressed)
        } else {
            encode_f64(&spectrum.mz, self.compressed)
        };
        self.write_array(doc, "64-bit float", "m/z array", "MS:1000514", mz_payload);
        self.write_array(
            doc,
            "32-bit float",
            "intensity array",
            "MS:1000515",
            encode_f32(&spectrum.intensity, self.compressed),
        );
        doc.push_str("        </binaryDataArrayList>\n");
        doc.push_str("      </spectrum>\n");
    }

    fn write_chromatogram(&self, doc: &mut String, index: usize, chrom: &FixtureChromatogram) {
        doc.push_str(&format!(
            "<chromatogram index=\"{index}\" id=\"{}\" defaultArrayLength=\"{}\">\n",
            chrom.id,
            chrom.time.len()
        ));
        cv_param(doc, 8, "MS:1000235", "total ion current chromatogram", "");
        doc.push_str("        <binaryDataArrayList count=\"2\">\n");
        self.write_array(
            doc,
            "64-bit float",
            "time array",
            "MS:1000595",
            encode_f64(&chrom.time, self.compressed),
        );
        self.write_array(
            doc,
            "32-bit float",
            "intensity array",
            "MS:1000515",
            encode_f32(&chrom.intensity, self.compressed),
        );
        doc.push_str("        </binaryDataArrayList>\n");
        doc.push_str("      </chromatogram>\n");
    }

    fn write_index(&self, doc: &mut String, name: &str, offsets: &[(String, u64)]) {
        doc.push_str(&format!("    <index name=\"{name}\">\n"));
        let mut entries: Vec<_> = offsets.iter().collect();
        if self.reverse_index {
            entries.reverse();
        }
        for (id, offset) in entries {
            doc.push_str(&format!("      <offset idRef=\"{id}\">{offset}</offset>\n"));
        }
        doc.push_str("    </index>\n");
    }

    pub fn build(&self) -> Fixture {
        let indexed = self.trailer != Trailer::Absent;
        let mut doc = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        if indexed {
            doc.push_str("<indexedmzML xmlns=\"http://psi.hupo.org/ms/mzml\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.2_idx.xsd\">\n");
        }
        doc.push_str(MZML_HEADER);

        let mut spectrum_offsets = Vec::new();
        doc.push_str(&format!(
            "    <spectrumList count=\"{}\" defaultDataProcessingRef=\"pwiz_Reader_conversion\">\n",
            self.spectra.len()
        ));
        for (i, spectrum) in self.spectra.iter().enumerate() {
            doc.push_str("      ");
            spectrum_offsets.push((spectrum.id.clone(), doc.len() as u64));
            self.write_spectrum(&mut doc, i, spectrum);
        }
        doc.push_str("    </spectrumList>\n");

        let mut chromatogram_offsets = Vec::new();
        if !self.chromatograms.is_empty() {
            doc.push_str(&format!(
                "    <chromatogramList count=\"{}\" defaultDataProcessingRef=\"pwiz_Reader_conversion\">\n",
                self.chromatograms.len()
            ));
            for (i, chrom) in self.chromatograms.iter().enumerate() {
                doc.push_str("      ");
                chromatogram_offsets.push((chrom.id.clone(), doc.len() as u64));
                self.write_chromatogram(&mut doc, i, chrom);
            }
            doc.push_str("    </chromatogramList>\n");
        }
        doc.push_str("  </run>\n</mzML>\n");

        let mut index_list_offset = None;
        if indexed {
            let offset = doc.len() as u64;
            index_list_offset = Some(offset);
            let n_indices = if chromatogram_offsets.is_empty() { 1 } else { 2 };
            doc.push_str(&format!("  <indexList count=\"{n_indices}\">\n"));
            self.write_index(&mut doc, "spectrum", &spectrum_offsets);
            if !chromatogram_offsets.is_empty() {
                self.write_index(&mut doc, "chromatogram", &chromatogram_offsets);
            }
            doc.push_str("  </indexList>\n");
            let stated = match self.trailer {
                Trailer::PastEnd => offset + 1_000_000,
                Trailer::BelowMinimum => 12,
                _ => offset,
            };
            doc.push_str(&format!("  <indexListOffset>{stated}</indexListOffset>\n"));
            doc.push_str(&format!("  <fileChecksum>{FIXTURE_CHECKSUM}</fileChecksum>\n"));
            doc.push_str("</indexedmzML>\n");
        }

        Fixture {
            bytes: doc.into_bytes(),
            spectrum_offsets,
            chromatogram_offsets,
            index_list_offset,
        }
    }
}
